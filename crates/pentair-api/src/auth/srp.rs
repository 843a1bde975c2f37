// Secure Remote Password (SRP-6a), Cognito flavour
//
// RFC 3526 3072-bit group, g = 2, SHA-256 over hex-padded big-endian
// values, and Cognito's "Caldera Derived Key" HKDF for the password claim.
// All hex padding follows the user-pool convention: even length, with a
// leading `00` whenever the high bit would otherwise be set.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use rand::RngCore;
use sha2::{Digest as _, Sha256};

use crate::error::Error;
use crate::sigv4::{hmac_sha256, sha256_hex};

const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key";

/// Size of the random private exponent `a`, in bytes.
const PRIVATE_KEY_BYTES: usize = 128;

struct Group {
    n: BigUint,
    g: BigUint,
    k: BigUint,
}

static GROUP: LazyLock<Group> = LazyLock::new(|| {
    let n = BigUint::parse_bytes(N_HEX.as_bytes(), 16).expect("SRP modulus is valid hex");
    let g = BigUint::from(2u32);
    let k = BigUint::from_bytes_be(&Sha256::digest(
        [padded_bytes(&n), padded_bytes(&g)].concat(),
    ));
    Group { n, g, k }
});

/// Parameters Cognito sends with a `PASSWORD_VERIFIER` challenge.
#[derive(Debug, Clone)]
pub struct PasswordVerifier {
    pub user_id_for_srp: String,
    pub srp_b: BigUint,
    pub salt: BigUint,
    pub secret_block: String,
}

impl PasswordVerifier {
    /// Pull the verifier fields out of `ChallengeParameters`.
    pub fn from_parameters(params: &HashMap<String, String>) -> Result<Self, Error> {
        let field = |name: &str| {
            params.get(name).ok_or_else(|| Error::Authentication {
                message: format!("PASSWORD_VERIFIER challenge is missing {name}"),
            })
        };

        Ok(Self {
            user_id_for_srp: field("USER_ID_FOR_SRP")?.clone(),
            srp_b: parse_hex("SRP_B", field("SRP_B")?)?,
            salt: parse_hex("SALT", field("SALT")?)?,
            secret_block: field("SECRET_BLOCK")?.clone(),
        })
    }
}

/// One client-side SRP exchange: the private exponent `a` and `A = g^a mod N`.
pub struct SrpSession {
    a: BigUint,
    big_a: BigUint,
}

impl std::fmt::Debug for SrpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpSession")
            .field("a", &"[REDACTED]")
            .field("big_a", &self.public_a_hex())
            .finish()
    }
}

impl Default for SrpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SrpSession {
    /// Start an exchange with a fresh random private exponent.
    pub fn new() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_private_key(BigUint::from_bytes_be(&bytes))
    }

    /// Start an exchange with a caller-chosen private exponent.
    pub fn from_private_key(a: BigUint) -> Self {
        let group = &*GROUP;
        let big_a = group.g.modpow(&a, &group.n);
        Self { a, big_a }
    }

    /// `SRP_A` as sent in `InitiateAuth`.
    pub fn public_a_hex(&self) -> String {
        self.big_a.to_str_radix(16)
    }

    /// Compute the 16-byte session key shared with the server.
    pub fn derive_key(
        &self,
        pool_name: &str,
        user_id: &str,
        password: &str,
        salt: &BigUint,
        srp_b: &BigUint,
    ) -> Result<[u8; 16], Error> {
        let group = &*GROUP;
        let zero = BigUint::default();

        let b = srp_b % &group.n;
        if b == zero {
            return Err(Error::Authentication {
                message: "server sent an invalid SRP_B".into(),
            });
        }

        let u = scrambling_parameter(&self.big_a, &b);
        if u == zero {
            return Err(Error::Authentication {
                message: "SRP scrambling parameter is zero".into(),
            });
        }

        let x = private_key_x(pool_name, user_id, password, salt)?;
        let kgx = (&group.k * group.g.modpow(&x, &group.n)) % &group.n;
        let base = (b + &group.n - kgx) % &group.n;
        let exponent = &self.a + &u * &x;
        let s = base.modpow(&exponent, &group.n);

        Ok(derive_session_key(&s, &u))
    }

    /// Build `PASSWORD_CLAIM_SIGNATURE` for a verifier challenge.
    pub fn password_claim(
        &self,
        pool_name: &str,
        challenge: &PasswordVerifier,
        password: &str,
        timestamp: &str,
    ) -> Result<String, Error> {
        let key = self.derive_key(
            pool_name,
            &challenge.user_id_for_srp,
            password,
            &challenge.salt,
            &challenge.srp_b,
        )?;

        let secret_block =
            BASE64
                .decode(challenge.secret_block.as_bytes())
                .map_err(|e| Error::Authentication {
                    message: format!("SECRET_BLOCK is not valid base64: {e}"),
                })?;

        let mut message = Vec::with_capacity(
            pool_name.len() + challenge.user_id_for_srp.len() + secret_block.len() + timestamp.len(),
        );
        message.extend_from_slice(pool_name.as_bytes());
        message.extend_from_slice(challenge.user_id_for_srp.as_bytes());
        message.extend_from_slice(&secret_block);
        message.extend_from_slice(timestamp.as_bytes());

        Ok(BASE64.encode(hmac_sha256(&key, &message)))
    }
}

/// `TIMESTAMP` in the format Cognito validates: `Tue Mar 5 07:08:09 UTC 2024`.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}

// ── Math helpers ─────────────────────────────────────────────────────

/// Hex with even length and a `00` prefix when the top bit is set.
fn pad_hex(value: &BigUint) -> String {
    let hex = value.to_str_radix(16);
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else if hex.starts_with(['8', '9', 'a', 'b', 'c', 'd', 'e', 'f']) {
        format!("00{hex}")
    } else {
        hex
    }
}

fn padded_bytes(value: &BigUint) -> Vec<u8> {
    let raw = value.to_bytes_be();
    match raw.first() {
        Some(&top) if top >= 0x80 => [&[0u8][..], &raw].concat(),
        _ => raw,
    }
}

fn parse_hex(name: &str, value: &str) -> Result<BigUint, Error> {
    BigUint::parse_bytes(value.as_bytes(), 16).ok_or_else(|| Error::Authentication {
        message: format!("{name} is not valid hex"),
    })
}

/// `u = H(pad(A) | pad(B))`
fn scrambling_parameter(big_a: &BigUint, b: &BigUint) -> BigUint {
    BigUint::from_bytes_be(&Sha256::digest(
        [padded_bytes(big_a), padded_bytes(b)].concat(),
    ))
}

/// `x = H(pad(salt) | H(poolName | userId | ":" | password))`
fn private_key_x(
    pool_name: &str,
    user_id: &str,
    password: &str,
    salt: &BigUint,
) -> Result<BigUint, Error> {
    let identity_hash = sha256_hex(format!("{pool_name}{user_id}:{password}").as_bytes());
    let bytes = hex::decode(format!("{}{identity_hash}", pad_hex(salt))).map_err(|e| {
        Error::Authentication {
            message: format!("invalid salt: {e}"),
        }
    })?;
    Ok(BigUint::from_bytes_be(&Sha256::digest(bytes)))
}

/// HKDF-SHA256 with `ikm = pad(S)`, `salt = pad(u)`, truncated to 16 bytes.
fn derive_session_key(s: &BigUint, u: &BigUint) -> [u8; 16] {
    let prk = hmac_sha256(&padded_bytes(u), &padded_bytes(s));
    let info = [DERIVED_KEY_INFO, &[1u8]].concat();
    let okm = hmac_sha256(&prk, &info);

    let mut key = [0u8; 16];
    key.copy_from_slice(&okm[..16]);
    key
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const POOL: &str = "lbiduhSwD";
    const USER_ID: &str = "0b7c2e6f-user";
    const PASSWORD: &str = "hunter2-pool";

    #[test]
    fn modulus_is_3072_bits() {
        assert_eq!(GROUP.n.bits(), 3072);
    }

    #[test]
    fn pad_hex_follows_user_pool_convention() {
        assert_eq!(pad_hex(&BigUint::from(0x7fu32)), "7f");
        assert_eq!(pad_hex(&BigUint::from(0x80u32)), "0080");
        assert_eq!(pad_hex(&BigUint::from(0xabcu32)), "0abc");
        assert_eq!(
            hex::encode(padded_bytes(&BigUint::from(0x80u32))),
            pad_hex(&BigUint::from(0x80u32))
        );
    }

    #[test]
    fn public_value_for_unit_exponent_is_generator() {
        let session = SrpSession::from_private_key(BigUint::from(1u32));
        assert_eq!(session.public_a_hex(), "2");
    }

    #[test]
    fn timestamp_uses_unpadded_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(now), "Tue Mar 5 07:08:09 UTC 2024");
    }

    #[test]
    fn client_and_server_agree_on_session_key() {
        let group = &*GROUP;
        let salt = BigUint::parse_bytes(b"e2f8a1c07d5b", 16).unwrap();
        let b_private = BigUint::parse_bytes(b"1f3d5c7a9b2e4d6f8a1c3e5f7b9d2a4c", 16).unwrap();

        // Server side: v = g^x, B = k*v + g^b.
        let x = private_key_x(POOL, USER_ID, PASSWORD, &salt).unwrap();
        let v = group.g.modpow(&x, &group.n);
        let srp_b = (&group.k * &v + group.g.modpow(&b_private, &group.n)) % &group.n;

        let client = SrpSession::new();
        let client_key = client
            .derive_key(POOL, USER_ID, PASSWORD, &salt, &srp_b)
            .unwrap();

        // Server computes S = (A * v^u)^b.
        let u = scrambling_parameter(&client.big_a, &srp_b);
        let server_s = (&client.big_a * v.modpow(&u, &group.n)).modpow(&b_private, &group.n);
        let server_key = derive_session_key(&server_s, &u);

        assert_eq!(client_key, server_key);
    }

    #[test]
    fn wrong_password_yields_different_key() {
        let group = &*GROUP;
        let salt = BigUint::from(0x5a17u32);
        let x = private_key_x(POOL, USER_ID, PASSWORD, &salt).unwrap();
        let v = group.g.modpow(&x, &group.n);
        let srp_b = (&group.k * &v + group.g.modpow(&BigUint::from(99u32), &group.n)) % &group.n;

        let client = SrpSession::from_private_key(BigUint::from(12345u32));
        let right = client.derive_key(POOL, USER_ID, PASSWORD, &salt, &srp_b).unwrap();
        let wrong = client.derive_key(POOL, USER_ID, "nope", &salt, &srp_b).unwrap();

        assert_ne!(right, wrong);
    }

    #[test]
    fn rejects_b_congruent_to_zero() {
        let client = SrpSession::from_private_key(BigUint::from(7u32));
        let result = client.derive_key(POOL, USER_ID, PASSWORD, &BigUint::from(1u32), &GROUP.n);
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }

    #[test]
    fn password_claim_is_deterministic_for_fixed_inputs() {
        let challenge = PasswordVerifier {
            user_id_for_srp: USER_ID.into(),
            srp_b: BigUint::from(0xbeefu32),
            salt: BigUint::from(0xc0ffeeu32),
            secret_block: BASE64.encode(b"opaque-secret-block"),
        };
        let session = SrpSession::from_private_key(BigUint::from(424_242u32));
        let ts = "Tue Mar 5 07:08:09 UTC 2024";

        let first = session.password_claim(POOL, &challenge, PASSWORD, ts).unwrap();
        let second = session.password_claim(POOL, &challenge, PASSWORD, ts).unwrap();

        assert_eq!(first, second);
        assert_eq!(BASE64.decode(first).unwrap().len(), 32);
    }

    #[test]
    fn verifier_parameters_require_every_field() {
        let mut params = HashMap::new();
        params.insert("USER_ID_FOR_SRP".to_string(), USER_ID.to_string());
        params.insert("SRP_B".to_string(), "abc".to_string());
        params.insert("SALT".to_string(), "12".to_string());

        let err = PasswordVerifier::from_parameters(&params).unwrap_err();
        assert!(err.to_string().contains("SECRET_BLOCK"), "{err}");

        params.insert("SECRET_BLOCK".to_string(), "c2VjcmV0".to_string());
        let verifier = PasswordVerifier::from_parameters(&params).unwrap();
        assert_eq!(verifier.srp_b, BigUint::from(0xabcu32));
    }
}
