//! # Bitcoin HTLC Script
//!
//! The guard table compiled to a locking-script predicate.
//!
//! ```text
//! OP_IF
//!     <redeemer_pubkey> OP_CHECKSIGVERIFY OP_SHA256 <secret_hash> OP_EQUALVERIFY
//! OP_ELSE
//!     <locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP <refunder_pubkey> OP_CHECKSIGVERIFY
//! OP_ENDIF
//! ```
//!
//! Only the taker-authority rows compile: each branch needs a signature, so
//! the public rows have no script form. A window that closes cannot be
//! expressed in script and is left to the cross-chain sequencing; an
//! unbounded window compiles its opening stage to `OP_CHECKLOCKTIMEVERIFY`.
//!
//! The byte layout above is the interoperability contract with the Bitcoin
//! side and is reproduced exactly. Under consensus rules both branches end
//! with an empty stack; [`evaluate`] models the guard semantics (signature,
//! preimage, locktime) that the template encodes.
//!
//! To redeem: `<secret> <signature> 0x01 <script>`
//! To refund: `<signature> <> <script>`

use super::guards::{Authority, Guard, Payee, GUARD_TABLE};
use super::secret::HashScheme;
use crate::domain::{BitcoinNetwork, Hash, PublicKey, Role, ScriptError, Secret};
use crate::ports::outbound::SignatureVerifier;
use bech32::{u5, ToBase32, Variant};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Smallest nLockTime interpreted as a unix timestamp.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

const PUBKEY_LEN: u8 = 33;
const HASH_LEN: u8 = 32;
const BRANCH_TRUE: u8 = 0x01;

mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_IF: u8 = 0x63;
    pub const OP_ELSE: u8 = 0x67;
    pub const OP_ENDIF: u8 = 0x68;
    pub const OP_DROP: u8 = 0x75;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_SHA256: u8 = 0xa8;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIGVERIFY: u8 = 0xad;
    pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
}

use opcodes::*;

// =============================================================================
// PARAMETERS
// =============================================================================

/// Inputs of the redeem script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcParams {
    /// Key that redeems with the secret.
    pub redeemer: PublicKey,
    /// Key that refunds after the locktime.
    pub refunder: PublicKey,
    /// SHA-256 of the secret.
    pub secret_hash: Hash,
    /// Absolute unix-time locktime of the refund branch.
    pub locktime: u32,
}

impl HtlcParams {
    /// Assigns redeemer and refunder from the leg role, like the EVM payees.
    pub fn for_role(
        role: Role,
        maker: PublicKey,
        taker: PublicKey,
        secret_hash: Hash,
        locktime: u32,
    ) -> Self {
        let pick = |payee: Payee| match (role, payee) {
            (Role::Source, Payee::Redeemer) | (Role::Destination, Payee::Refunder) => taker,
            (Role::Source, Payee::Refunder) | (Role::Destination, Payee::Redeemer) => maker,
        };
        Self {
            redeemer: pick(Payee::Redeemer),
            refunder: pick(Payee::Refunder),
            secret_hash,
            locktime,
        }
    }

    fn key(&self, payee: Payee) -> &PublicKey {
        match payee {
            Payee::Redeemer => &self.redeemer,
            Payee::Refunder => &self.refunder,
        }
    }
}

/// Converts an absolute timestamp to a time-based CLTV locktime.
pub fn locktime_from_timestamp(timestamp: u64) -> Result<u32, ScriptError> {
    match u32::try_from(timestamp) {
        Ok(locktime) if locktime >= LOCKTIME_THRESHOLD => Ok(locktime),
        _ => Err(ScriptError::LocktimeOutOfRange(timestamp)),
    }
}

// =============================================================================
// COMPILATION
// =============================================================================

fn private_guard(requires_secret: bool) -> Result<&'static Guard, ScriptError> {
    GUARD_TABLE
        .iter()
        .find(|g| g.authority == Authority::Taker && g.requires_secret == requires_secret)
        .ok_or(ScriptError::MissingGuard(if requires_secret {
            "redeem"
        } else {
            "refund"
        }))
}

/// Minimal little-endian script number.
fn encode_scriptnum(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    let mut v = value;
    while v > 0 {
        out.push((v & 0xff) as u8);
        v >>= 8;
    }
    if out.last().is_some_and(|b| b & 0x80 != 0) {
        out.push(0x00);
    }
    out
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    script.push(data.len() as u8);
    script.extend_from_slice(data);
}

fn emit_branch(script: &mut Vec<u8>, guard: &Guard, params: &HtlcParams) {
    if guard.closes.is_none() {
        push_data(script, &encode_scriptnum(params.locktime));
        script.push(OP_CHECKLOCKTIMEVERIFY);
        script.push(OP_DROP);
    }
    push_data(script, params.key(guard.payee).as_bytes());
    script.push(OP_CHECKSIGVERIFY);
    if guard.requires_secret {
        script.push(OP_SHA256);
        push_data(script, params.secret_hash.as_bytes());
        script.push(OP_EQUALVERIFY);
    }
}

/// Compiles the redeem script.
pub fn compile(params: &HtlcParams) -> Result<Vec<u8>, ScriptError> {
    if params.locktime < LOCKTIME_THRESHOLD {
        return Err(ScriptError::LocktimeOutOfRange(u64::from(params.locktime)));
    }
    let redeem = private_guard(true)?;
    let refund = private_guard(false)?;

    let mut script = Vec::with_capacity(116);
    script.push(OP_IF);
    emit_branch(&mut script, redeem, params);
    script.push(OP_ELSE);
    emit_branch(&mut script, refund, params);
    script.push(OP_ENDIF);
    Ok(script)
}

// =============================================================================
// PARSING
// =============================================================================

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn mismatch(&self, reason: &'static str) -> ScriptError {
        ScriptError::TemplateMismatch {
            offset: self.pos,
            reason,
        }
    }

    fn op(&mut self, expected: u8, reason: &'static str) -> Result<(), ScriptError> {
        match self.bytes.get(self.pos) {
            Some(b) if *b == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.mismatch(reason)),
        }
    }

    fn push(&mut self, len: u8, reason: &'static str) -> Result<&'a [u8], ScriptError> {
        self.op(len, reason)?;
        let end = self.pos + usize::from(len);
        let data = self.bytes.get(self.pos..end).ok_or_else(|| self.mismatch(reason))?;
        self.pos = end;
        Ok(data)
    }

    fn scriptnum(&mut self) -> Result<u32, ScriptError> {
        let len = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.mismatch("locktime push"))?;
        if !(1..=5).contains(&len) {
            return Err(self.mismatch("locktime push"));
        }
        let data = self.push(len, "locktime push")?;
        let value = data
            .iter()
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        u32::try_from(value).map_err(|_| ScriptError::LocktimeOutOfRange(value))
    }

    fn end(&self) -> Result<(), ScriptError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(self.mismatch("trailing bytes"))
        }
    }
}

/// Recovers the parameters of a redeem script.
///
/// Strict: the script must be exactly what [`compile`] produces for the
/// recovered parameters, including minimal locktime encoding.
pub fn parse_redeem_script(script: &[u8]) -> Result<HtlcParams, ScriptError> {
    let mut c = Cursor { bytes: script, pos: 0 };
    c.op(OP_IF, "OP_IF")?;
    let redeemer = c.push(PUBKEY_LEN, "redeemer pubkey")?;
    c.op(OP_CHECKSIGVERIFY, "OP_CHECKSIGVERIFY")?;
    c.op(OP_SHA256, "OP_SHA256")?;
    let secret_hash = c.push(HASH_LEN, "secret hash")?;
    c.op(OP_EQUALVERIFY, "OP_EQUALVERIFY")?;
    c.op(OP_ELSE, "OP_ELSE")?;
    let locktime = c.scriptnum()?;
    c.op(OP_CHECKLOCKTIMEVERIFY, "OP_CHECKLOCKTIMEVERIFY")?;
    c.op(OP_DROP, "OP_DROP")?;
    let refunder = c.push(PUBKEY_LEN, "refunder pubkey")?;
    c.op(OP_CHECKSIGVERIFY, "OP_CHECKSIGVERIFY")?;
    c.op(OP_ENDIF, "OP_ENDIF")?;
    c.end()?;

    let params = HtlcParams {
        redeemer: PublicKey::from_slice(redeemer).ok_or(ScriptError::TemplateMismatch {
            offset: 2,
            reason: "redeemer pubkey prefix",
        })?,
        refunder: PublicKey::from_slice(refunder).ok_or(ScriptError::TemplateMismatch {
            offset: script.len() - 35,
            reason: "refunder pubkey prefix",
        })?,
        secret_hash: Hash::from_slice(secret_hash).ok_or(ScriptError::TemplateMismatch {
            offset: 38,
            reason: "secret hash",
        })?,
        locktime,
    };

    let canonical = compile(&params)?;
    if canonical != script {
        let offset = canonical
            .iter()
            .zip(script)
            .position(|(a, b)| a != b)
            .unwrap_or(canonical.len().min(script.len()));
        return Err(ScriptError::TemplateMismatch {
            offset,
            reason: "non-minimal locktime encoding",
        });
    }
    Ok(params)
}

// =============================================================================
// OUTPUTS
// =============================================================================

/// A compiled HTLC with its output encodings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitcoinHtlc {
    params: HtlcParams,
    script: Vec<u8>,
}

impl BitcoinHtlc {
    /// Compiles the script for `params`.
    pub fn new(params: HtlcParams) -> Result<Self, ScriptError> {
        let script = compile(&params)?;
        Ok(Self { params, script })
    }

    /// Parses and wraps an existing redeem script.
    pub fn from_script(script: &[u8]) -> Result<Self, ScriptError> {
        let params = parse_redeem_script(script)?;
        Ok(Self {
            params,
            script: script.to_vec(),
        })
    }

    /// Script parameters.
    pub fn params(&self) -> &HtlcParams {
        &self.params
    }

    /// Redeem (witness) script bytes.
    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// SHA-256 of the script, the P2WSH witness program.
    pub fn witness_program(&self) -> [u8; 32] {
        Sha256::digest(&self.script).into()
    }

    /// `OP_0 <sha256(script)>`.
    pub fn p2wsh_script_pubkey(&self) -> Vec<u8> {
        let mut spk = Vec::with_capacity(34);
        spk.push(OP_0);
        push_data(&mut spk, &self.witness_program());
        spk
    }

    /// Bech32 (witness v0) address.
    pub fn p2wsh_address(&self, network: BitcoinNetwork) -> Result<String, ScriptError> {
        let version = u5::try_from_u8(0).map_err(|e| ScriptError::AddressEncoding(e.to_string()))?;
        let mut data = vec![version];
        data.extend(self.witness_program().to_base32());
        bech32::encode(network.bech32_hrp(), data, Variant::Bech32)
            .map_err(|e| ScriptError::AddressEncoding(e.to_string()))
    }

    /// RIPEMD-160 of SHA-256 of the script.
    pub fn script_hash160(&self) -> [u8; 20] {
        Ripemd160::digest(Sha256::digest(&self.script)).into()
    }

    /// `OP_HASH160 <hash160(script)> OP_EQUAL`.
    pub fn p2sh_script_pubkey(&self) -> Vec<u8> {
        let mut spk = Vec::with_capacity(23);
        spk.push(OP_HASH160);
        push_data(&mut spk, &self.script_hash160());
        spk.push(OP_EQUAL);
        spk
    }

    /// Base58check P2SH address.
    pub fn p2sh_address(&self, network: BitcoinNetwork) -> String {
        let mut payload = Vec::with_capacity(25);
        payload.push(network.p2sh_version());
        payload.extend_from_slice(&self.script_hash160());
        let checksum = Sha256::digest(Sha256::digest(&payload));
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(payload).into_string()
    }

    /// Whether `script_pubkey` commits to this script (P2WSH or P2SH).
    pub fn locks(&self, script_pubkey: &[u8]) -> bool {
        script_pubkey == self.p2wsh_script_pubkey() || script_pubkey == self.p2sh_script_pubkey()
    }

    /// Witness for the secret branch.
    pub fn redeem_witness(&self, signature: &[u8], secret: &Secret) -> Vec<Vec<u8>> {
        vec![
            secret.to_vec(),
            signature.to_vec(),
            vec![BRANCH_TRUE],
            self.script.clone(),
        ]
    }

    /// Witness for the timeout branch.
    pub fn refund_witness(&self, signature: &[u8]) -> Vec<Vec<u8>> {
        vec![signature.to_vec(), Vec::new(), self.script.clone()]
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Chain facts an HTLC spend is judged against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendContext {
    /// Digest the signature must cover.
    pub sighash: [u8; 32],
    /// nLockTime of the spending transaction.
    pub tx_lock_time: u32,
    /// Median time past of the chain tip.
    pub median_time_past: u64,
}

/// Branch a valid witness took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpendPath {
    /// Secret branch; the preimage is now public.
    Redeem {
        /// Revealed preimage.
        secret: Secret,
    },
    /// Timeout branch.
    Refund,
}

/// Judges a witness against the output it spends.
pub fn evaluate(
    witness: &[Vec<u8>],
    script_pubkey: &[u8],
    ctx: &SpendContext,
    verifier: &dyn SignatureVerifier,
) -> Result<SpendPath, ScriptError> {
    let script = witness
        .last()
        .ok_or(ScriptError::MalformedWitness("empty witness"))?;
    let htlc = BitcoinHtlc::from_script(script)?;
    if !htlc.locks(script_pubkey) {
        return Err(ScriptError::ScriptHashMismatch);
    }
    let params = htlc.params();

    match witness {
        [secret, signature, branch, _] if branch[..] == [BRANCH_TRUE] => {
            if !verifier.verify(&params.redeemer, &ctx.sighash, signature) {
                return Err(ScriptError::InvalidSignature);
            }
            let secret: Secret = secret
                .as_slice()
                .try_into()
                .map_err(|_| ScriptError::MalformedWitness("secret must be 32 bytes"))?;
            if !HashScheme::Sha256.verify(&secret, &params.secret_hash) {
                return Err(ScriptError::SecretMismatch);
            }
            Ok(SpendPath::Redeem { secret })
        }
        [signature, branch, _] if branch.is_empty() => {
            if ctx.tx_lock_time < params.locktime {
                return Err(ScriptError::LocktimeNotReached {
                    script_locktime: params.locktime,
                    tx_lock_time: ctx.tx_lock_time,
                });
            }
            if u64::from(ctx.tx_lock_time) >= ctx.median_time_past {
                return Err(ScriptError::LocktimeNotFinal {
                    tx_lock_time: ctx.tx_lock_time,
                    median_time_past: ctx.median_time_past,
                });
            }
            if !verifier.verify(&params.refunder, &ctx.sighash, signature) {
                return Err(ScriptError::InvalidSignature);
            }
            Ok(SpendPath::Refund)
        }
        _ => Err(ScriptError::MalformedWitness("unexpected stack shape")),
    }
}

/// Preimage carried by a redeem witness, if this is one.
pub fn extract_secret(witness: &[Vec<u8>]) -> Option<Secret> {
    match witness {
        [secret, _, branch, _] if branch[..] == [BRANCH_TRUE] => {
            secret.as_slice().try_into().ok()
        }
        _ => None,
    }
}

/// Digest signed by HTLC spends on the in-memory chain.
///
/// `sha256d(txid || vout || value || recipient_script || lock_time)`.
pub fn spend_digest(
    outpoint_txid: &Hash,
    vout: u32,
    value_sats: u64,
    recipient_script: &[u8],
    tx_lock_time: u32,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(outpoint_txid.as_bytes());
    hasher.update(vout.to_le_bytes());
    hasher.update(value_sats.to_le_bytes());
    hasher.update(recipient_script);
    hasher.update(tx_lock_time.to_le_bytes());
    Sha256::digest(hasher.finalize()).into()
}
