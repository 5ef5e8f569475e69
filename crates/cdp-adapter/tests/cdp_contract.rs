//! Contract tests that drive `CdpAdapter` against a real Chromium binary. Ignored by
//! default because they need Chrome on the host.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{Cdp, CdpAdapter, CdpConfig};

const FORM_PAGE: &str = "data:text/html,<main><h2>Store listing</h2><label for=n>App name</label><input id=n value=old><label><input type=checkbox> Contains ads</label><button onclick=\"document.title='saved'\">Save</button></main>";

fn contract_enabled() -> bool {
    env::var("CONSOLE_PILOT_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

async fn setup_adapter() -> (Arc<CdpAdapter>, tempfile::TempDir) {
    let profile = tempfile::tempdir().expect("temporary chrome profile");
    let mut cfg = CdpConfig::default();
    cfg.user_data_dir = Some(profile.path().to_path_buf());
    let adapter = Arc::new(CdpAdapter::new(cfg).expect("chrome available"));
    adapter.start().await.expect("adapter start");
    (adapter, profile)
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set CONSOLE_PILOT_CDP_CONTRACT=1"]
async fn contract_snapshot_fill_and_check() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CONSOLE_PILOT_CDP_CONTRACT not enabled)");
        return;
    }
    let (adapter, _profile) = setup_adapter().await;
    adapter
        .navigate(FORM_PAGE, Duration::from_secs(15))
        .await
        .expect("navigate");

    let snap = adapter.snapshot().await.expect("snapshot");
    let field = snap
        .nodes
        .iter()
        .find(|n| n.role.as_deref() == Some("textbox") && n.name == "App name")
        .expect("labelled textbox");
    adapter
        .fill(&snap.node_ref(field.index), "Android News")
        .await
        .expect("fill");

    let ads = snap
        .nodes
        .iter()
        .find(|n| n.role.as_deref() == Some("checkbox"))
        .expect("checkbox");
    adapter
        .set_checked(&snap.node_ref(ads.index), true)
        .await
        .expect("check");

    let after = adapter.snapshot().await.expect("second snapshot");
    let field = after.nodes.iter().find(|n| n.name == "App name").unwrap();
    assert_eq!(field.value.as_deref(), Some("Android News"));
    assert!(after
        .nodes
        .iter()
        .any(|n| n.role.as_deref() == Some("checkbox") && n.checked == Some(true)));

    adapter.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set CONSOLE_PILOT_CDP_CONTRACT=1"]
async fn contract_screenshot_and_reload() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CONSOLE_PILOT_CDP_CONTRACT not enabled)");
        return;
    }
    let (adapter, _profile) = setup_adapter().await;
    adapter
        .navigate(FORM_PAGE, Duration::from_secs(15))
        .await
        .expect("navigate");
    adapter.reload(Duration::from_secs(15)).await.expect("reload");
    let png = adapter.screenshot().await.expect("screenshot");
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    adapter.shutdown().await;
}
