//! Generated values for the cluster document
//!
//! The API database credentials are filled in at layer-1 configure time from
//! random alphanumeric strings. The generator takes its randomness source as a
//! parameter so tests can seed it.
//!
//! These values are NOT a trust boundary. The generator draws from whatever
//! `Rng` the caller passes and makes no cryptographic claim; do not reuse it
//! for keys, tokens or anything else that must resist guessing.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the generated database username
pub const DATABASE_USERNAME_LEN: usize = 8;

/// Length of the generated database password
pub const DATABASE_PASSWORD_LEN: usize = 32;

/// Random string of ASCII letters and digits
pub fn random_alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Username and password for the API database
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    /// Database role name
    pub username: String,
    /// Database role password
    pub password: String,
}

impl DatabaseCredentials {
    /// Generate a fresh username/password pair
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            username: random_alphanumeric(rng, DATABASE_USERNAME_LEN),
            password: random_alphanumeric(rng, DATABASE_PASSWORD_LEN),
        }
    }
}
