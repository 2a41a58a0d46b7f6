//! HMAC-SHA256 签名的会话 cookie
//!
//! cookie 值形如 `<token>.<base64url(tag)>`，服务端只信任签名校验通过的令牌。

use axum::http::{header, HeaderMap};
use data_encoding::BASE64URL_NOPAD;
use ring::hmac;
use time::Duration;

pub struct SessionCookies {
    key: hmac::Key,
    name: String,
    secure: bool,
    ttl: Duration,
}

impl SessionCookies {
    pub fn new(secret: &[u8], name: impl Into<String>, secure: bool, ttl: Duration) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            name: name.into(),
            secure,
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sign(&self, token: &str) -> String {
        let tag = hmac::sign(&self.key, token.as_bytes());
        format!("{token}.{}", BASE64URL_NOPAD.encode(tag.as_ref()))
    }

    /// 校验签名并取回令牌
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (token, tag) = value.rsplit_once('.')?;
        if token.is_empty() {
            return None;
        }
        let tag = BASE64URL_NOPAD.decode(tag.as_bytes()).ok()?;
        hmac::verify(&self.key, token.as_bytes(), &tag).ok()?;
        Some(token)
    }

    /// 勾选“记住我”时带 `Max-Age`，否则是浏览器会话 cookie
    pub fn set_cookie(&self, token: &str, remember_me: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.name,
            self.sign(token)
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if remember_me {
            cookie.push_str(&format!("; Max-Age={}", self.ttl.whole_seconds()));
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.name);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// 从 `Cookie` 头中找出本服务的 cookie；签名不对等同于没有
    pub fn token_from_headers<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .and_then(|(_, value)| self.verify(value))
    }
}
