//! Marker headers the gateway adds to what it relays.

use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;

pub static X_MOXY_PROXIED: HeaderName = HeaderName::from_static("x-moxy-proxied");
pub static X_MOXY_MOCKED: HeaderName = HeaderName::from_static("x-moxy-mocked");
pub static X_MOXY_REPLAYED: HeaderName = HeaderName::from_static("x-moxy-replayed");
pub static SOAP_ACTION: HeaderName = HeaderName::from_static("soapaction");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");

/// Content type of everything relayed on the SOAP path.
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Extension trait for stamping gateway markers onto header collections.
pub trait MoxyHeadersExt {
    /// Set `name: true`, replacing any value already present.
    fn set_marker(&mut self, name: &HeaderName);

    /// First value of `name` as text, if present and printable.
    fn text(&self, name: &HeaderName) -> Option<&str>;
}

impl MoxyHeadersExt for HeaderMap {
    fn set_marker(&mut self, name: &HeaderName) {
        self.insert(name.clone(), VALUE_TRUE.clone());
    }

    fn text(&self, name: &HeaderName) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// SOAPAction value without the surrounding quotes clients usually send.
pub fn soap_action(headers: &HeaderMap) -> Option<String> {
    headers
        .text(&SOAP_ACTION)
        .map(|action| action.trim().trim_matches('"').to_string())
        .filter(|action| !action.is_empty())
}
