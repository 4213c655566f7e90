use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::models::ids::{PoolId, RewardAccount};

/// Serialization tag of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CertificateKind {
    /// Registers a stake credential so it can delegate and earn rewards
    StakeRegistration = 0,
    /// Revokes a stake registration and returns the deposit
    StakeDeregistration = 1,
    /// Delegates a registered stake credential to a pool
    StakeDelegation = 2,
    PoolRegistration = 3,
    /// Retires a pool at the given epoch
    PoolRetirement = 4,
    GenesisKeyDelegation = 5,
    MoveInstantaneousRewards = 6,
}

impl TryFrom<u8> for CertificateKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => CertificateKind::StakeRegistration,
            1 => CertificateKind::StakeDeregistration,
            2 => CertificateKind::StakeDelegation,
            3 => CertificateKind::PoolRegistration,
            4 => CertificateKind::PoolRetirement,
            5 => CertificateKind::GenesisKeyDelegation,
            6 => CertificateKind::MoveInstantaneousRewards,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirPot {
    Reserves,
    Treasury,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Certificate {
    StakeRegistration {
        stake_credential: RewardAccount,
    },
    StakeDeregistration {
        stake_credential: RewardAccount,
    },
    StakeDelegation {
        stake_credential: RewardAccount,
        pool_id: PoolId,
    },
    PoolRegistration {
        pool_id: PoolId,
        reward_account: RewardAccount,
    },
    PoolRetirement {
        pool_id: PoolId,
        epoch: u64,
    },
    GenesisKeyDelegation {
        genesis_hash: String,
        delegate_hash: String,
    },
    MoveInstantaneousRewards {
        pot: MirPot,
        quantity: u64,
    },
}

impl Certificate {
    pub fn kind(&self) -> CertificateKind {
        match self {
            Certificate::StakeRegistration { .. } => CertificateKind::StakeRegistration,
            Certificate::StakeDeregistration { .. } => CertificateKind::StakeDeregistration,
            Certificate::StakeDelegation { .. } => CertificateKind::StakeDelegation,
            Certificate::PoolRegistration { .. } => CertificateKind::PoolRegistration,
            Certificate::PoolRetirement { .. } => CertificateKind::PoolRetirement,
            Certificate::GenesisKeyDelegation { .. } => CertificateKind::GenesisKeyDelegation,
            Certificate::MoveInstantaneousRewards { .. } => CertificateKind::MoveInstantaneousRewards,
        }
    }

    /// Stake credential the certificate acts on, for stake certificates only
    pub fn stake_credential(&self) -> Option<&RewardAccount> {
        match self {
            Certificate::StakeRegistration { stake_credential }
            | Certificate::StakeDeregistration { stake_credential }
            | Certificate::StakeDelegation {
                stake_credential, ..
            } => Some(stake_credential),
            _ => None,
        }
    }
}
