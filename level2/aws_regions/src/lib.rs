use portfolio_lib::SynthError;

pub const VALID_AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-north-1",
    "eu-west-3",
    "eu-west-2",
    "eu-west-1",
    "eu-central-1",
    "eu-south-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-east-1",
    "sa-east-1",
    "cn-north-1",
    "cn-northwest-1",
    "us-gov-east-1",
    "us-gov-west-1",
    "me-south-1",
    "af-south-1",
];

/// CloudFront only accepts ACM certificates issued in this region.
pub const CLOUDFRONT_CERTIFICATE_REGION: &str = "us-east-1";

/// The account and region a stack deploys into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: &str, region: &str) -> Result<Self, SynthError> {
        verify_account(account)?;
        verify_region(region)?;
        Ok(Self {
            account: account.to_string(),
            region: region.to_string(),
        })
    }

    pub fn partition(&self) -> &'static str {
        partition_for(&self.region)
    }
}

pub fn is_valid_region(r: &str) -> bool {
    VALID_AWS_REGIONS.contains(&r)
}

pub fn verify_region(r: &str) -> Result<(), SynthError> {
    if !is_valid_region(r) {
        return Err(SynthError::invalid_input(
            "environment",
            format!("Invalid region code {:?}\nMust be one of {:?}", r, VALID_AWS_REGIONS),
        ));
    }
    Ok(())
}

pub fn verify_account(account: &str) -> Result<(), SynthError> {
    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
        return Err(SynthError::invalid_input(
            "environment",
            format!("Invalid account id {:?}\nMust be exactly 12 digits", account),
        ));
    }
    Ok(())
}

pub fn partition_for(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}
