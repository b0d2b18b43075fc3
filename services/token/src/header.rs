use crate::error::AuthenticateErr;

/// Extracts the token from an authorization header value.
///
/// Returns `Ok(None)` when no header is given or it names another scheme,
/// so that other authentication schemes can handle the request.
///
/// # Errors
/// - [`AuthenticateErr::MalformedHeader`] if the scheme matches but is
///   followed by no token or by more than one word
pub fn extract_bearer<'a>(
    header: Option<&'a str>,
    prefix: &str,
) -> Result<Option<&'a str>, AuthenticateErr> {
    let Some(header) = header else {
        return Ok(None);
    };

    let mut parts = header.split_whitespace();
    if parts.next() != Some(prefix) {
        return Ok(None);
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        (None, _) => Err(AuthenticateErr::MalformedHeader(
            "no credentials provided",
        )),
        (Some(_), Some(_)) => Err(AuthenticateErr::MalformedHeader(
            "credentials string should not contain spaces",
        )),
    }
}
