//! HTTP options merging and version headers

use std::collections::BTreeMap;

use crate::types::config::HttpOptions;

const LIBRARY_LABEL: &str = concat!("google-genai-sdk/", env!("CARGO_PKG_VERSION"), " gl-rust");

/// Merge per-call overrides onto the client's options. Set fields win
/// field-wise; headers merge shallowly with override entries replacing
/// same-named client entries.
pub(crate) fn patch_http_options(
    base: &HttpOptions,
    overlay: Option<&HttpOptions>,
) -> HttpOptions {
    let Some(overlay) = overlay else {
        return base.clone();
    };
    let mut headers = base.headers.clone();
    for (name, value) in &overlay.headers {
        headers.insert(name.clone(), value.clone());
    }
    HttpOptions {
        base_url: overlay.base_url.clone().or_else(|| base.base_url.clone()),
        api_version: overlay
            .api_version
            .clone()
            .or_else(|| base.api_version.clone()),
        headers,
        timeout: overlay.timeout.or(base.timeout),
        skip_project_and_location_in_path: overlay
            .skip_project_and_location_in_path
            .or(base.skip_project_and_location_in_path),
        response_payload: overlay.response_payload.or(base.response_payload),
    }
}

/// Append the library identification label to `user-agent` and
/// `x-goog-api-client`, creating the headers when absent and never
/// appending twice.
pub(crate) fn append_library_version_headers(headers: &mut BTreeMap<String, String>) {
    for name in ["user-agent", "x-goog-api-client"] {
        match headers.get_mut(name) {
            Some(existing) if existing.contains(LIBRARY_LABEL) => {}
            Some(existing) => {
                existing.push(' ');
                existing.push_str(LIBRARY_LABEL);
            }
            None => {
                headers.insert(name.to_string(), LIBRARY_LABEL.to_string());
            }
        }
    }
}
