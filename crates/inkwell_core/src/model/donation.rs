use serde::{Deserialize, Serialize};

/// Payment QR code shown on article pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationQrCode {
    pub id: String,
    /// Display label, e.g. the payment provider name.
    pub name: String,
    /// Icon kind understood by the front end (`wechat`, `alipay`, ...).
    pub icon: String,
    pub qrcode_url: String,
    pub sort_order: i64,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewDonationQrCode {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    pub qrcode_url: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DonationQrCodePatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub qrcode_url: Option<String>,
    pub sort_order: Option<i64>,
    pub enabled: Option<bool>,
}
