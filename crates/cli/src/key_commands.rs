use {
    serde_json::{Value, json},
    strongbox_crypto::{EncryptionKey, key::generate_salt},
};

/// A fresh random key for `encryption.key`, plus a salt for passphrase mode.
pub fn keygen() -> Value {
    let key = EncryptionKey::generate();
    json!({
        "key": key.to_base64().as_str(),
        "salt": generate_salt(),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, strongbox_crypto::key::decode_salt};

    #[test]
    fn generated_key_loads_back() {
        let out = keygen();
        EncryptionKey::from_base64(out["key"].as_str().unwrap()).unwrap();
        assert_eq!(decode_salt(out["salt"].as_str().unwrap()).unwrap().len(), 16);
        assert_ne!(keygen()["key"], out["key"]);
    }
}
