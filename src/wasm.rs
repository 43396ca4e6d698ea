//! WASM bindings for the civic identity core
//!
//! Exposes the client-side primitives to JavaScript via wasm-bindgen. Field
//! elements cross the boundary as `0x`-prefixed 64-digit hex strings; errors
//! surface as thrown JS errors.

use wasm_bindgen::{prelude::*, JsCast};

use crate::action_domain::{build_action_domain, ActionDomainParams};
use crate::did::{derive_did_key, derive_did_key_from_base64url};
use crate::field::hex_to_field;
use crate::nullifier::compute_nullifier;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Parse and canonicalize a field element.
#[wasm_bindgen(js_name = hexToField)]
pub fn hex_to_field_js(input: &str) -> Result<String, JsError> {
    Ok(hex_to_field(input)?.to_hex())
}

#[wasm_bindgen(js_name = hash2)]
pub fn hash2_js(a: &str, b: &str) -> Result<String, JsError> {
    let a = hex_to_field(a)?;
    let b = hex_to_field(b)?;
    Ok(crate::hash::hash2(&a, &b).to_hex())
}

#[wasm_bindgen(js_name = computeNullifier)]
pub fn compute_nullifier_js(user_secret: &str, action_domain: &str) -> Result<String, JsError> {
    let secret = hex_to_field(user_secret)?;
    let domain = hex_to_field(action_domain)?;
    Ok(compute_nullifier(&secret, &domain).to_hex())
}

/// Takes the JSON form of the action parameters (camelCase keys).
#[wasm_bindgen(js_name = buildActionDomain)]
pub fn build_action_domain_js(params_json: &str) -> Result<String, JsError> {
    let params: ActionDomainParams = serde_json::from_str(params_json)?;
    Ok(build_action_domain(&params)?.to_hex())
}

/// Accepts either raw COSE_Key bytes or the base64url string a browser
/// authenticator returns.
#[wasm_bindgen(js_name = deriveDidKey)]
pub fn derive_did_key_js(public_key: JsValue) -> Result<String, JsError> {
    if let Some(encoded) = public_key.as_string() {
        return Ok(derive_did_key_from_base64url(&encoded)?);
    }
    let bytes = public_key
        .dyn_ref::<js_sys::Uint8Array>()
        .map(js_sys::Uint8Array::to_vec)
        .ok_or_else(|| JsError::new("expected a base64url string or Uint8Array"))?;
    Ok(derive_did_key(&bytes)?)
}

#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    format!("civic-identity-core WASM v{} (Poseidon2/BN254)", env!("CARGO_PKG_VERSION"))
}
