//! End-to-end engine test: a full enable drives exactly the expected tc
//! command sequence, in order, against a scripted runner.

use std::sync::Arc;

use shaper_core::testkit::ScriptedRunner;
use shaper_core::{FixedInterfaces, Shaper, ShapingIntent, ShapingLimits};

fn shaper() -> (Arc<ScriptedRunner>, Shaper) {
    let runner = Arc::new(ScriptedRunner::ok());
    let shaper = Shaper::new(
        runner.clone(),
        Arc::new(FixedInterfaces::new(["ethA", "ethB"])),
        ShapingLimits::default(),
    );
    (runner, shaper)
}

#[tokio::test]
async fn enable_emits_expected_tc_sequence() {
    let (runner, shaper) = shaper();

    shaper
        .update(ShapingIntent {
            enabled: true,
            delay_ms: 50,
            bandwidth_mbps: 10.0,
            interface_in: Some("ethA".to_string()),
            interface_out: Some("ethB".to_string()),
        })
        .await
        .unwrap();

    let lines: Vec<String> = runner
        .calls()
        .into_iter()
        .map(|c| c.args.join(" "))
        .collect();

    // subnet detection is scripted as 10.0.0.0/24 on the output interface
    assert_eq!(
        lines,
        vec![
            "qdisc del dev ethA root",
            "qdisc del dev ethA ingress",
            "qdisc del dev ethB root",
            "qdisc del dev ethB ingress",
            "qdisc add dev ethA root handle 1: htb default 30",
            "class add dev ethA parent 1: classid 1:1 htb rate 10000kbit",
            "filter add dev ethA protocol ip parent 1: prio 1 u32 match ip src 10.0.0.0/24 flowid 1:1",
            "qdisc add dev ethB root handle 2: htb default 30",
            "class add dev ethB parent 2: classid 2:1 htb rate 10000kbit",
            "filter add dev ethB protocol ip parent 2: prio 1 u32 match u32 0 0 flowid 2:1",
            "qdisc add dev ethA parent 1:1 handle 10: netem delay 50ms",
            "qdisc add dev ethB parent 2:1 handle 20: netem delay 50ms",
        ]
    );
}

#[tokio::test]
async fn failed_subnet_detection_scopes_filter_to_fallback() {
    let runner = Arc::new(
        ScriptedRunner::ok()
            .with_ip_output(shaper_core::CmdOutput::failed("Device \"ethB\" does not exist.")),
    );
    let shaper = Shaper::new(
        runner.clone(),
        Arc::new(FixedInterfaces::new(["ethA", "ethB"])),
        ShapingLimits::default(),
    );

    shaper
        .update(ShapingIntent {
            enabled: true,
            delay_ms: 0,
            bandwidth_mbps: 10.0,
            interface_in: Some("ethA".to_string()),
            interface_out: Some("ethB".to_string()),
        })
        .await
        .unwrap();

    // detection degraded but shaping proceeded, scoped to the fallback net
    let filter_line = runner
        .calls()
        .into_iter()
        .map(|c| c.args.join(" "))
        .find(|line| line.contains("match ip src"))
        .unwrap();
    assert!(filter_line.contains("172.22.22.0/24"));
}

#[tokio::test]
async fn delay_only_enable_uses_root_netem() {
    let (runner, shaper) = shaper();

    shaper
        .update(ShapingIntent {
            enabled: true,
            delay_ms: 100,
            bandwidth_mbps: 1000.0,
            interface_in: Some("ethA".to_string()),
            interface_out: Some("ethB".to_string()),
        })
        .await
        .unwrap();

    let lines: Vec<String> = runner
        .calls()
        .into_iter()
        .map(|c| c.args.join(" "))
        .collect();
    assert_eq!(
        lines[4..],
        [
            "qdisc add dev ethA root netem delay 100ms".to_string(),
            "qdisc add dev ethB root netem delay 100ms".to_string(),
        ]
    );
}
