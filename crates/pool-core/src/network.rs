//! Network definitions: parent chain parameters and share chain parameters.

use core::fmt;
use core::str::FromStr;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};

use crate::difficulty::two_pow_256;
use crate::error::{DataError, Result};

/// Proof-of-work function a chain hashes its headers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowAlgorithm {
    X16r,
    X16rt,
    Lyra2re3,
}

impl PowAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            PowAlgorithm::X16r => "x16r",
            PowAlgorithm::X16rt => "x16rt",
            PowAlgorithm::Lyra2re3 => "lyra2re3",
        }
    }
}

/// Parameters of the parent (block) chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub name: &'static str,
    pub symbol: &'static str,
    /// Magic bytes that start every p2p message.
    pub p2p_prefix: [u8; 4],
    pub p2p_port: u16,
    pub rpc_port: u16,
    /// Base58 version byte of pubkey hash addresses.
    pub address_version: u8,
    /// Base58 version byte of script hash addresses.
    pub segwit_address_version: u8,
    /// Bech32 human readable part.
    pub human_readable_part: &'static str,
    /// Target seconds between blocks.
    pub block_period: u32,
    pub pow_algorithm: PowAlgorithm,
    /// Outputs below this many base units are not paid out.
    pub dust_threshold: u64,
    pub dumb_scrypt_diff: u32,
    pub block_explorer_url_prefix: &'static str,
    pub address_explorer_url_prefix: &'static str,
    pub tx_explorer_url_prefix: &'static str,
}

const SUBSIDY_HALVING_INTERVAL: u64 = 840_000;
const INITIAL_SUBSIDY: u64 = 50 * 100_000_000;

impl ChainParams {
    /// Block subsidy in base units for a given height.
    ///
    /// Halves every 840,000 blocks, counted from height -1.
    pub fn subsidy(&self, height: u64) -> u64 {
        let halvings = height.saturating_add(1) / SUBSIDY_HALVING_INTERVAL;
        if halvings >= 64 {
            return 0;
        }
        INITIAL_SUBSIDY >> halvings
    }

    /// Lowest and highest block targets considered sane:
    /// `(2^256/10^18 - 1, 2^256/10^5 - 1)`.
    pub fn sane_target_range(&self) -> (BigUint, BigUint) {
        let low = two_pow_256() / BigUint::from(1_000_000_000_000_000_000u64) - 1u8;
        let high = two_pow_256() / BigUint::from(100_000u32) - 1u8;
        (low, high)
    }

    pub fn block_explorer_url(&self, block_hash: &str) -> String {
        format!("{}{}", self.block_explorer_url_prefix, block_hash)
    }

    pub fn address_explorer_url(&self, address: &str) -> String {
        format!("{}{}", self.address_explorer_url_prefix, address)
    }

    pub fn tx_explorer_url(&self, txid: &str) -> String {
        format!("{}{}", self.tx_explorer_url_prefix, txid)
    }
}

/// Parameters of the share chain that runs on top of a parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    pub name: &'static str,
    /// Target seconds between shares.
    pub share_period: u32,
    pub chain_length: u32,
    pub real_chain_length: u32,
    pub target_lookbehind: u32,
    /// Number of blocks a share's payout is spread over.
    pub spread: u32,
    pub identifier: [u8; 8],
    pub prefix: [u8; 8],
    pub p2p_port: u16,
    pub worker_port: u16,
    pub min_target: u64,
    /// `log2` of the divisor in `max_target = 2^256 / 2^n - 1`.
    pub max_target_shift: u32,
    pub persist: bool,
    pub bootstrap_addrs: &'static [&'static str],
    pub announce_channel: &'static str,
    pub softforks_required: &'static [&'static str],
    pub segwit_activation_version: u32,
    pub minimum_protocol_version: Option<u32>,
    pub new_minimum_protocol_version: Option<u32>,
}

impl PoolParams {
    pub fn min_target(&self) -> BigUint {
        BigUint::from(self.min_target)
    }

    pub fn max_target(&self) -> BigUint {
        (BigUint::one() << (256 - self.max_target_shift) as usize) - 1u8
    }
}

static VEILCOIN: ChainParams = ChainParams {
    name: "veilcoin",
    symbol: "VEIL",
    p2p_prefix: [0xb6, 0xcf, 0xd0, 0xa3],
    p2p_port: 58810,
    rpc_port: 58812,
    address_version: 70,
    segwit_address_version: 5,
    human_readable_part: "veil",
    block_period: 60,
    pow_algorithm: PowAlgorithm::X16r,
    dust_threshold: 3_000_000,
    dumb_scrypt_diff: 16,
    block_explorer_url_prefix: "http://explorer.vtconline.org/block/",
    address_explorer_url_prefix: "http://explorer.vtconline.org/address/",
    tx_explorer_url_prefix: "http://explorer.vtconline.org/tx/",
};

static VEILCOIN_TESTNET: ChainParams = ChainParams {
    name: "veilcoin_testnet",
    symbol: "VEILTEST",
    p2p_prefix: [0xa8, 0xd1, 0xa7, 0xc4],
    p2p_port: 58811,
    rpc_port: 58813,
    address_version: 111,
    segwit_address_version: 196,
    human_readable_part: "tveil",
    block_period: 60,
    pow_algorithm: PowAlgorithm::Lyra2re3,
    dust_threshold: 3_000_000,
    dumb_scrypt_diff: 256,
    block_explorer_url_prefix: "http://test.vtc.sovereignshare.com/exp/#/vtctest/",
    address_explorer_url_prefix: "http://test.vtc.sovereignshare.com/exp/#/vtctest/address/",
    tx_explorer_url_prefix: "http://test.vtc.sovereignshare.com/exp/#/vtctest/tx/",
};

static VEIL_TESTNET: ChainParams = ChainParams {
    name: "veil_testnet",
    symbol: "VEILTEST",
    p2p_prefix: [0xa8, 0xd1, 0xa7, 0xc4],
    p2p_port: 58811,
    rpc_port: 58813,
    address_version: 111,
    segwit_address_version: 196,
    human_readable_part: "tveil",
    block_period: 60,
    pow_algorithm: PowAlgorithm::X16rt,
    dust_threshold: 3_000_000,
    dumb_scrypt_diff: 256,
    block_explorer_url_prefix: "https://testnet.veil-project.com/block/",
    address_explorer_url_prefix: "https://testnet.veil-project.com/address/",
    tx_explorer_url_prefix: "https://testnet.veil-project.com/tx/",
};

// 24 hours of shares at one every ten seconds
const CHAIN_LENGTH: u32 = 24 * 60 * 60 / 10;
const TESTNET_SOFTFORKS: &[&str] = &["nversionbips", "csv", "segwit"];

static VEILCOIN_POOL: PoolParams = PoolParams {
    name: "veilcoin",
    share_period: 15,
    chain_length: CHAIN_LENGTH,
    real_chain_length: CHAIN_LENGTH,
    target_lookbehind: 200,
    spread: 12,
    identifier: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x84],
    prefix: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x85],
    p2p_port: 58816,
    worker_port: 58817,
    min_target: 4,
    max_target_shift: 20,
    persist: false,
    bootstrap_addrs: &["explorer.veil-project.com", "veil.pool-address.com"],
    announce_channel: "#p2pool-veil",
    softforks_required: &[],
    segwit_activation_version: 17,
    minimum_protocol_version: Some(70000),
    new_minimum_protocol_version: Some(70020),
};

static VEILCOIN_TESTNET_POOL: PoolParams = PoolParams {
    name: "veilcoin_testnet",
    share_period: 15,
    chain_length: CHAIN_LENGTH,
    real_chain_length: CHAIN_LENGTH,
    target_lookbehind: 200,
    spread: 12,
    identifier: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x73],
    prefix: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x74],
    p2p_port: 58814,
    worker_port: 58815,
    min_target: 4,
    max_target_shift: 20,
    persist: false,
    bootstrap_addrs: &["veil.pool-address.com", "veil.pool-address2.com"],
    announce_channel: "#p2pool-veil-testnet",
    softforks_required: TESTNET_SOFTFORKS,
    segwit_activation_version: 16,
    minimum_protocol_version: None,
    new_minimum_protocol_version: None,
};

static VEIL_TESTNET_POOL: PoolParams = PoolParams {
    name: "veil_testnet",
    share_period: 15,
    chain_length: CHAIN_LENGTH,
    real_chain_length: CHAIN_LENGTH,
    target_lookbehind: 200,
    spread: 12,
    identifier: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x72],
    prefix: [0x7c, 0x36, 0x14, 0xa6, 0xbc, 0xdc, 0xf7, 0x93],
    p2p_port: 58814,
    worker_port: 58815,
    min_target: 4,
    max_target_shift: 20,
    persist: false,
    bootstrap_addrs: &["veil.pool-address.com", "veil.pool-address2.com"],
    announce_channel: "#p2pool-veil-testnet",
    softforks_required: TESTNET_SOFTFORKS,
    segwit_activation_version: 16,
    minimum_protocol_version: None,
    new_minimum_protocol_version: None,
};

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    Veilcoin,
    VeilcoinTestnet,
    VeilTestnet,
}

impl Network {
    pub const ALL: [Network; 3] = [
        Network::Veilcoin,
        Network::VeilcoinTestnet,
        Network::VeilTestnet,
    ];

    pub fn chain(&self) -> &'static ChainParams {
        match self {
            Network::Veilcoin => &VEILCOIN,
            Network::VeilcoinTestnet => &VEILCOIN_TESTNET,
            Network::VeilTestnet => &VEIL_TESTNET,
        }
    }

    pub fn pool(&self) -> &'static PoolParams {
        match self {
            Network::Veilcoin => &VEILCOIN_POOL,
            Network::VeilcoinTestnet => &VEILCOIN_TESTNET_POOL,
            Network::VeilTestnet => &VEIL_TESTNET_POOL,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        self.chain().name
    }

    /// Get display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Veilcoin => "Veil",
            Network::VeilcoinTestnet => "Veil Testnet (lyra2re3)",
            Network::VeilTestnet => "Veil Testnet",
        }
    }

    pub fn is_testnet(&self) -> bool {
        !matches!(self, Network::Veilcoin)
    }
}

impl FromStr for Network {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "veilcoin" | "veil" | "mainnet" => Ok(Network::Veilcoin),
            "veilcoin_testnet" => Ok(Network::VeilcoinTestnet),
            "veil_testnet" | "testnet" => Ok(Network::VeilTestnet),
            other => Err(DataError::Domain(format!("unknown network {:?}", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
