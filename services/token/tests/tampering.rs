use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rstest::rstest;
use serde_json::Value;
use token::VerifyTokenErr;

use crate::common::{Engine, PRIMARY_PRIVATE_KEY, PRIMARY_PUBLIC_KEY, fixture_context};

mod common;

fn segments(token: &str) -> Vec<String> {
    token.split('.').map(str::to_string).collect()
}

fn reencode<F>(segment: &str, mut func: F) -> String
where
    F: FnMut(&mut Value),
{
    let bytes = URL_SAFE_NO_PAD.decode(segment).unwrap();
    let mut value: Value = serde_json::from_slice(&bytes).unwrap();
    func(&mut value);
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
}

fn flip(c: char) -> char {
    if c == 'A' { 'B' } else { 'A' }
}

#[test]
fn test_every_signature_byte_is_checked() {
    // given
    let engine = Engine::default_with(|_| {});
    let verifier = engine.verifier();
    let token = engine.issue(&fixture_context(|_| {}));
    let signature_start = token.rfind('.').unwrap() + 1;

    for position in signature_start..token.len() {
        // when
        let mut bytes: Vec<char> = token.chars().collect();
        bytes[position] = flip(bytes[position]);
        let tampered: String = bytes.into_iter().collect();
        let got = verifier.verify(&tampered);

        // then
        assert!(
            matches!(got, Err(VerifyTokenErr::BadSignature)),
            "signature position {position} was not rejected: {got:?}"
        );
    }
}

#[test]
fn test_no_single_byte_change_is_accepted() {
    // given
    let engine = Engine::default_with(|_| {});
    let verifier = engine.verifier();
    let token = engine.issue(&fixture_context(|_| {}));

    for position in 0..token.len() {
        // when
        let mut bytes: Vec<char> = token.chars().collect();
        if bytes[position] == '.' {
            continue;
        }
        bytes[position] = flip(bytes[position]);
        let tampered: String = bytes.into_iter().collect();
        let got = verifier.verify(&tampered);

        // then
        assert!(got.is_err(), "position {position} was accepted");
    }
}

#[rstest]
#[case::escalated_scope(|p: &mut Value| p["scope"] = Value::from("read write admin"))]
#[case::other_subject(|p: &mut Value| p["sub"] = Value::from("43"))]
#[case::extended_expiry(|p: &mut Value| p["exp"] = Value::from(p["exp"].as_i64().unwrap() + 86_400))]
#[case::trusted_issuer(|p: &mut Value| p["iss"] = Value::from("partner.example"))]
fn test_forged_payload(#[case] forge: fn(&mut Value)) {
    // given
    let engine = Engine::default_with(|_| {});
    let token = engine.issue(&fixture_context(|_| {}));
    let parts = segments(&token);
    let forged = format!("{}.{}.{}", parts[0], reencode(&parts[1], forge), parts[2]);

    // when
    let got = engine.verifier().verify(&forged);

    // then
    assert!(matches!(got, Err(VerifyTokenErr::BadSignature)));
}

#[rstest]
#[case::stronger_rsa(|h: &mut Value| h["alg"] = Value::from("RS512"))]
#[case::hmac(|h: &mut Value| h["alg"] = Value::from("HS256"))]
#[case::pss(|h: &mut Value| h["alg"] = Value::from("PS256"))]
fn test_rewritten_header_algorithm(#[case] rewrite: fn(&mut Value)) {
    // given
    let engine = Engine::default_with(|_| {});
    let token = engine.issue(&fixture_context(|_| {}));
    let parts = segments(&token);
    let forged = format!("{}.{}.{}", reencode(&parts[0], rewrite), parts[1], parts[2]);

    // when
    let got = engine.verifier().verify(&forged);

    // then
    assert!(matches!(got, Err(VerifyTokenErr::BadSignature)));
}

fn payload(engine: &Engine) -> Value {
    serde_json::to_value(engine.issuer.claims(&fixture_context(|_| {}))).unwrap()
}

#[test]
fn test_algorithm_outside_allow_list_is_rejected_with_valid_key() {
    // given
    let engine = Engine::default_with(|_| {});
    let key = EncodingKey::from_rsa_pem(PRIMARY_PRIVATE_KEY.as_bytes()).unwrap();
    let token = encode(&Header::new(Algorithm::RS512), &payload(&engine), &key).unwrap();

    // when
    let got = engine.verifier().verify(&token);

    // then
    assert!(matches!(got, Err(VerifyTokenErr::BadSignature)));
}

#[test]
fn test_algorithm_inside_allow_list_is_accepted() {
    // given
    let engine = Engine::default_with(|c| {
        c.allowed_algorithms = vec![Algorithm::RS256, Algorithm::RS512];
    });
    let key = EncodingKey::from_rsa_pem(PRIMARY_PRIVATE_KEY.as_bytes()).unwrap();
    let token = encode(&Header::new(Algorithm::RS512), &payload(&engine), &key).unwrap();

    // when
    let got = engine.verifier().verify(&token);

    // then
    assert!(got.is_ok());
}

#[test]
fn test_hmac_signed_with_public_key_is_rejected() {
    // given
    let engine = Engine::default_with(|_| {});
    let key = EncodingKey::from_secret(PRIMARY_PUBLIC_KEY.as_bytes());
    let token = encode(&Header::new(Algorithm::HS256), &payload(&engine), &key).unwrap();

    // when
    let got = engine.verifier().verify(&token);

    // then
    assert!(matches!(got, Err(VerifyTokenErr::BadSignature)));
}
