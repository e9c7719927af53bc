//! Nostr event model and tag extraction.

use anyhow::{anyhow, bail, Result};
use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kinds the relay persists and serves.
pub const KIND_TEXT_NOTE: u32 = 1;
pub const KIND_FOLLOW_LIST: u32 = 3;
pub const KIND_REACTION: u32 = 7;
pub const KIND_IMAGE: u32 = 20;
pub const KIND_ZAP_RECEIPT: u32 = 9735;
pub const KIND_ARTICLE: u32 = 30023;
/// NIP-42 client authentication.
pub const KIND_CLIENT_AUTH: u32 = 22242;

/// Simple tag wrapper preserving tag fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

/// Core Nostr event received from upstreams and served to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1` or `9735`.
    pub kind: u32,
    /// Unix timestamp claimed by the signer.
    pub created_at: u64,
    /// Arbitrary tags.
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    /// First value of the named tag, if present.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags.iter().find_map(|Tag(fields)| match fields.as_slice() {
            [n, v, ..] if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    /// Target of the first `e` tag.
    pub fn first_e_tag(&self) -> Option<&str> {
        self.tag_value("e")
    }

    /// Root note referenced by this event's `e` tags.
    ///
    /// A tag explicitly marked `root` wins; otherwise the first `e`
    /// tag with an empty marker; otherwise the first `e` tag.
    pub fn root_note_id(&self) -> Option<&str> {
        let mut first = None;
        let mut first_unmarked = None;
        for Tag(fields) in &self.tags {
            let [name, value, rest @ ..] = fields.as_slice() else {
                continue;
            };
            if name != "e" {
                continue;
            }
            match rest.first().map(String::as_str) {
                Some("root") => return Some(value),
                Some("") | None if first_unmarked.is_none() => first_unmarked = Some(value),
                _ => {}
            }
            if first.is_none() {
                first = Some(value);
            }
        }
        first_unmarked.or(first).map(String::as_str)
    }

    /// Pubkeys named by `p` tags (the followees of a kind-3 list).
    pub fn p_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter_map(|Tag(fields)| match fields.as_slice() {
                [n, v, ..] if n == "p" => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sender of a zap receipt, read from the embedded description event.
    ///
    /// The receipt's outer pubkey is the zap service, not the zapper;
    /// the actual sender signs the inner `description` payload.
    pub fn zapper_id(&self) -> Result<String> {
        let desc = self
            .tag_value("description")
            .ok_or_else(|| anyhow!("no description tag in zap receipt"))?;
        #[derive(Deserialize)]
        struct Description {
            pubkey: String,
        }
        let parsed: Description = serde_json::from_str(desc)
            .map_err(|e| anyhow!("malformed description tag: {e}"))?;
        Ok(parsed.pubkey)
    }

    /// Zap amount in sats, decoded from the `bolt11` tag.
    pub fn zap_amount_sats(&self) -> Result<i64> {
        let invoice = self
            .tag_value("bolt11")
            .ok_or_else(|| anyhow!("no bolt11 tag in zap receipt"))?;
        Ok(bolt11_millisats(invoice)? / 1000)
    }
}

/// Decode the human-readable part of a bolt11 invoice to millisats.
fn bolt11_millisats(invoice: &str) -> Result<i64> {
    let sep = invoice
        .rfind('1')
        .ok_or_else(|| anyhow!("invoice has no separator"))?;
    let hrp = &invoice[..sep];
    let body = hrp
        .strip_prefix("ln")
        .ok_or_else(|| anyhow!("invoice missing ln prefix"))?;
    let start = body
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| anyhow!("invoice carries no amount"))?;
    let amount_str = &body[start..];
    let (digits, multiplier) = match amount_str.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&amount_str[..amount_str.len() - 1], Some(c)),
        _ => (amount_str, None),
    };
    let amount: i64 = digits
        .parse()
        .map_err(|_| anyhow!("invalid amount digits in invoice"))?;
    // 1 BTC = 10^11 millisats; multipliers scale down from there.
    let msat = match multiplier {
        None => amount.checked_mul(100_000_000_000),
        Some('m') => amount.checked_mul(100_000_000),
        Some('u') => amount.checked_mul(100_000),
        Some('n') => amount.checked_mul(100),
        Some('p') => {
            if amount % 10 != 0 {
                bail!("sub-millisat precision in invoice");
            }
            Some(amount / 10)
        }
        Some(other) => bail!("unknown amount multiplier {other}"),
    };
    msat.ok_or_else(|| anyhow!("invoice amount overflows"))
}

/// SHA-256 of the canonical `[0, pubkey, created_at, kind, tags,
/// content]` serialization, which is what the event id names and the
/// signature covers.
fn id_digest(ev: &Event) -> Result<[u8; 32]> {
    let canonical = serde_json::to_vec(&serde_json::json!([
        0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content
    ]))?;
    Ok(Sha256::digest(&canonical).into())
}

/// Check that the claimed id matches the canonical serialization and
/// that the Schnorr signature was made over it by the author key.
pub fn verify_event(ev: &Event) -> Result<()> {
    let digest = id_digest(ev)?;
    if hex::encode(digest) != ev.id {
        bail!("event id does not match its serialization");
    }
    let author = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    Secp256k1::verification_only().verify_schnorr(
        &sig,
        &Message::from_digest_slice(&digest)?,
        &author,
    )?;
    Ok(())
}

/// Sign an event with the given secret key, filling `id` and `sig`.
///
/// Test helper for the protocol paths; the relay itself never signs.
#[cfg(test)]
pub fn sign_event(mut ev: Event, seckey: &[u8; 32]) -> Event {
    let secp = Secp256k1::new();
    let kp = secp256k1::Keypair::from_seckey_slice(&secp, seckey).expect("valid secret key");
    ev.pubkey = hex::encode(kp.x_only_public_key().0.serialize());
    let digest = id_digest(&ev).expect("serializable event");
    ev.id = hex::encode(digest);
    let msg = Message::from_digest_slice(&digest).expect("32-byte digest");
    let sig = secp.sign_schnorr_no_aux_rand(&msg, &kp);
    ev.sig = hex::encode(sig.as_ref());
    ev
}
