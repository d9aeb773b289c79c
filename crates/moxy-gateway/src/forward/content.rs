//! Inbound content-type admission.

use crate::error::GatewayError;
use crate::model::ServiceKind;

const SOAP_MEDIA_TYPES: &[&str] = &["text/xml", "application/soap+xml", "application/xml"];

const REST_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/x-www-form-urlencoded",
];

/// Media type without parameters, lowercased: `Text/XML; charset=utf-8` -> `text/xml`.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Reject requests whose declared content type the service kind cannot relay.
///
/// A missing content type is accepted everywhere. REST requests without a
/// payload are not checked at all.
pub fn check_content_type(
    kind: ServiceKind,
    content_type: Option<&str>,
    has_payload: bool,
) -> Result<(), GatewayError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };
    let media = media_type(content_type);

    let accepted = match kind {
        ServiceKind::Soap => SOAP_MEDIA_TYPES.contains(&media.as_str()),
        ServiceKind::Rest { .. } if !has_payload => true,
        ServiceKind::Rest { .. } => {
            REST_MEDIA_TYPES.contains(&media.as_str())
                || media.starts_with("text/")
                || (media.starts_with("application/")
                    && (media.ends_with("+json") || media.ends_with("+xml")))
        }
    };

    if accepted {
        Ok(())
    } else {
        Err(GatewayError::UnsupportedContentType(content_type.to_string()))
    }
}
