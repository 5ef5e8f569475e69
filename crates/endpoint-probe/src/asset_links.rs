//! Digital asset links descriptor checks
//!
//! The descriptor served at `/.well-known/assetlinks.json` is a JSON array of
//! statements. It vouches for an app when one statement targets the app's
//! package and carries at least one non-empty certificate fingerprint.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{errors::AssetLinksError, prober::ProbeResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatement {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relation: Vec<String>,
    pub target: AssetTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Absent on web targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default)]
    pub sha256_cert_fingerprints: Vec<String>,
}

/// Passing statement for the expected package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLinksReport {
    pub package: String,
    pub fingerprints: Vec<String>,
    pub statements: usize,
}

pub fn assert_asset_links(
    response: &ProbeResponse,
    expected_package: &str,
) -> Result<AssetLinksReport, AssetLinksError> {
    if !response.is_success() {
        return Err(AssetLinksError::Status(response.status));
    }
    match response.media_type() {
        Some(media) if media == "application/json" => {}
        other => warn!(
            content_type = other.as_deref().unwrap_or("-"),
            "asset links served without application/json"
        ),
    }

    let body = response
        .body
        .as_deref()
        .ok_or_else(|| AssetLinksError::Malformed("body unreadable".to_string()))?;
    let statements: Vec<AssetStatement> =
        serde_json::from_str(body).map_err(|err| AssetLinksError::Malformed(err.to_string()))?;
    if statements.is_empty() {
        return Err(AssetLinksError::Empty);
    }

    let mut packages = Vec::new();
    for statement in &statements {
        let Some(package) = statement.target.package_name.as_deref() else {
            continue;
        };
        if package != expected_package {
            packages.push(package.to_string());
            continue;
        }
        let fingerprints: Vec<String> = statement
            .target
            .sha256_cert_fingerprints
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if fingerprints.is_empty() {
            return Err(AssetLinksError::MissingFingerprint {
                package: package.to_string(),
            });
        }
        return Ok(AssetLinksReport {
            package: package.to_string(),
            fingerprints,
            statements: statements.len(),
        });
    }

    Err(AssetLinksError::PackageMismatch {
        expected: expected_package.to_string(),
        found: if packages.is_empty() {
            "no android_app target".to_string()
        } else {
            packages.join(", ")
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(body: &str) -> ProbeResponse {
        ProbeResponse {
            status: 200,
            content_type: Some("application/json; charset=utf-8".into()),
            body: Some(body.into()),
        }
    }

    const DESCRIPTOR: &str = r#"[{"target":{"package_name":"com.example.app","sha256_cert_fingerprints":["AA:BB:CC"]}}]"#;

    #[test]
    fn matching_package_with_fingerprint_passes() {
        let report = assert_asset_links(&json(DESCRIPTOR), "com.example.app").unwrap();
        assert_eq!(report.package, "com.example.app");
        assert_eq!(report.fingerprints, vec!["AA:BB:CC".to_string()]);
    }

    #[test]
    fn other_package_names_the_mismatch() {
        let err = assert_asset_links(&json(DESCRIPTOR), "com.other.app").unwrap_err();
        assert_eq!(
            err,
            AssetLinksError::PackageMismatch {
                expected: "com.other.app".into(),
                found: "com.example.app".into(),
            }
        );
        assert!(err.to_string().contains("com.other.app"));
    }

    #[test]
    fn blank_fingerprints_do_not_count() {
        let body = r#"[{"relation":["delegate_permission/common.handle_all_urls"],
            "target":{"namespace":"android_app","package_name":"com.example.app","sha256_cert_fingerprints":["  "]}}]"#;
        assert_eq!(
            assert_asset_links(&json(body), "com.example.app").unwrap_err(),
            AssetLinksError::MissingFingerprint {
                package: "com.example.app".into()
            }
        );
    }

    #[test]
    fn status_empty_and_garbage_are_reported() {
        let mut not_found = json("");
        not_found.status = 404;
        assert_eq!(
            assert_asset_links(&not_found, "com.example.app").unwrap_err(),
            AssetLinksError::Status(404)
        );
        assert_eq!(
            assert_asset_links(&json("[]"), "com.example.app").unwrap_err(),
            AssetLinksError::Empty
        );
        assert!(matches!(
            assert_asset_links(&json("<html>"), "com.example.app"),
            Err(AssetLinksError::Malformed(_))
        ));
    }

    #[test]
    fn web_targets_are_skipped_and_text_plain_tolerated() {
        let body = r#"[{"target":{"namespace":"web","site":"https://androidnews.app"}},
            {"target":{"package_name":"com.example.app","sha256_cert_fingerprints":["AA"]}}]"#;
        let mut response = json(body);
        response.content_type = Some("text/plain".into());
        let report = assert_asset_links(&response, "com.example.app").unwrap();
        assert_eq!(report.statements, 2);
    }
}
