use std::time::Duration;

/// Finds `name` in a `Cookie` request header. Names are case-sensitive.
pub fn get_cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}

/// Attributes for the session cookie the client is asked to store.
#[derive(Debug, Clone)]
pub struct SetCookie<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub max_age: Duration,
    pub secure: bool,
}

impl SetCookie<'_> {
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
            self.name,
            self.value,
            self.max_age.as_secs()
        );
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}
