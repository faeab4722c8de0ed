//! Segment encoding and HMAC-SHA256 signing for the three-part token format.

// crates.io
use base64::{
	Engine as _,
	alphabet,
	engine::{
		DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::STANDARD_NO_PAD,
	},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{_prelude::*, auth::SigningSecret};

type HmacSha256 = Hmac<Sha256>;

const LENIENT_CONFIG: GeneralPurposeConfig =
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
// Issued tokens use the standard alphabet; URL-safe input is folded into it before decoding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT_CONFIG);

/// Fixed token header.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Header {
	typ: String,
	alg: String,
}
impl Header {
	pub(crate) fn hs256() -> Self {
		Self { typ: "JWT".into(), alg: "HS256".into() }
	}
}

/// Serializes `value` to JSON and base64-encodes it without padding.
pub(crate) fn encode_segment<T>(value: &T) -> Result<String, serde_json::Error>
where
	T: Serialize,
{
	let json = serde_json::to_vec(value)?;

	Ok(STANDARD_NO_PAD.encode(json))
}

/// Decodes a segment encoded with either base64 alphabet, with or without padding.
pub(crate) fn decode_segment(segment: &str) -> Option<Vec<u8>> {
	let folded: String = segment
		.chars()
		.map(|c| match c {
			'-' => '+',
			'_' => '/',
			other => other,
		})
		.collect();

	LENIENT.decode(folded).ok()
}

fn mac(secret: &SigningSecret, signing_input: &str) -> HmacSha256 {
	let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.expose())
		.unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));

	mac.update(signing_input.as_bytes());

	mac
}

/// Returns the encoded signature for `signing_input`.
pub(crate) fn sign(secret: &SigningSecret, signing_input: &str) -> String {
	STANDARD_NO_PAD.encode(mac(secret, signing_input).finalize().into_bytes())
}

/// Checks an encoded signature in constant time.
pub(crate) fn signature_matches(
	secret: &SigningSecret,
	signing_input: &str,
	signature: &str,
) -> bool {
	// Only the canonical encoding is accepted so every altered character is detected.
	let Ok(raw) = STANDARD_NO_PAD.decode(signature) else {
		return false;
	};

	mac(secret, signing_input).verify_slice(&raw).is_ok()
}
