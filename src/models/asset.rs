use serde::{Deserialize, Serialize};

use crate::models::ids::AssetId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub decimals: Option<u8>,
}

/// Asset information resolved through the asset provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset_id: AssetId,
    pub policy_id: String,
    pub name: String,
    pub supply: u64,
    pub token_metadata: Option<TokenMetadata>,
}
