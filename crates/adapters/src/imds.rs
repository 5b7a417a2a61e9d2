// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The single outbound network call the core ever makes (§6.6): probing the
//! instance-metadata service to discriminate Azure from Arc when the
//! wrapper's config left `cloudType` unspecified and the process is running
//! in auto-assessment mode.

use lpe_core::CloudType;
use std::time::Duration;

const IMDS_URL: &str = "http://169.254.169.254/metadata/instance/compute?api-version=2019-06-01";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_ATTEMPTS: u32 = 5;

/// Probes IMDS with linear backoff (`sleep i+1 s` between attempts). A
/// `200 OK` response means the host is an Azure VM; any other outcome
/// (including every attempt timing out) is treated as Arc, since Arc-managed
/// machines have no metadata endpoint to answer.
pub async fn probe_cloud_type() -> CloudType {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return CloudType::Arc,
    };
    for attempt in 0..PROBE_ATTEMPTS {
        let result = client
            .get(IMDS_URL)
            .header("Metadata", "True")
            .header("User-Agent", "ArcAgent")
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => return CloudType::Azure,
            _ => {
                if attempt + 1 < PROBE_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs((attempt + 1) as u64)).await;
                }
            }
        }
    }
    CloudType::Arc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_constants_match_the_documented_contract() {
        assert_eq!(PROBE_TIMEOUT, Duration::from_secs(2));
        assert_eq!(PROBE_ATTEMPTS, 5);
        assert!(IMDS_URL.contains("api-version=2019-06-01"));
    }
}
