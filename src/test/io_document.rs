use std::fs;

use super::{line3, no_attrs, plan};
use crate::config::PlanConfig;
use crate::demo::{IpOverWdmOpts, build_ip_over_wdm};
use crate::io::{PlanDocument, SCHEMA_VERSION};
use crate::net::{NetPlan, NetPlanError, RoutingType};

fn reload(p: &NetPlan) -> NetPlan {
    let json = p.to_document().to_json_string().unwrap();
    let doc = PlanDocument::from_json_str(&json).unwrap();
    NetPlan::from_document(&doc, *p.config()).unwrap()
}

#[test]
fn document_round_trip_preserves_ids_and_derived_state() {
    let mut t = line3();
    let seg = t.plan.add_protection_segment(vec![t.l12], 2.0, no_attrs()).unwrap();
    t.plan.add_backup_segment_to_route(t.route, seg).unwrap();
    t.plan.set_link_failure_state(t.l01, false).unwrap();

    let loaded = reload(&t.plan);
    loaded.check_caches_consistency().unwrap();
    assert_eq!(loaded.to_document(), t.plan.to_document());
    assert!(loaded.route(t.route).unwrap().is_down());
    assert!(loaded.route(t.route).unwrap().backup_segments().contains(&seg));
    assert_eq!(loaded.route(t.route).unwrap().carried_traffic_if_not_failing(), 5.0);
}

#[test]
fn multilayer_plan_survives_a_file_round_trip() {
    let mut p = plan();
    let topo = build_ip_over_wdm(&mut p, &IpOverWdmOpts::default()).unwrap();
    p.set_routing_type(topo.ip, RoutingType::HopByHopRouting).unwrap();

    let dir = std::env::temp_dir().join(format!("netplan-rs-io-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("plan.json");
    p.save_json_file(&path).unwrap();
    let loaded = NetPlan::load_json_file(&path, PlanConfig::default()).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(loaded.to_document(), p.to_document());
    let lp = topo.lightpaths[0];
    assert_eq!(loaded.demand(lp).unwrap().coupled_link(), Some(topo.ip_links[0]));
    assert!(loaded.coupling_dag().is_coupled(topo.wdm, topo.ip));
    assert_eq!(loaded.layer(topo.ip).unwrap().routing_type(), RoutingType::HopByHopRouting);
    loaded.check_caches_consistency().unwrap();
}

#[test]
fn loaded_plan_keeps_allocating_fresh_ids() {
    let t = line3();
    let mut loaded = reload(&t.plan);
    let n = loaded.add_node("late", 0.0, 0.0, no_attrs()).unwrap();
    assert!(t.plan.network_element(n.0).is_none());
    assert!(n.0 > t.route.0);
}

#[test]
fn wrong_schema_version_and_duplicate_ids_are_rejected() {
    let t = line3();
    let mut doc = t.plan.to_document();
    doc.schema_version = SCHEMA_VERSION + 1;
    let json = serde_json::to_string(&doc).unwrap();
    assert!(matches!(
        PlanDocument::from_json_str(&json),
        Err(NetPlanError::InvalidArgument(_))
    ));

    let mut doc = t.plan.to_document();
    doc.nodes[1].id = doc.nodes[0].id;
    assert!(NetPlan::from_document(&doc, PlanConfig::default()).is_err());

    assert!(matches!(
        PlanDocument::from_json_str("{ not json"),
        Err(NetPlanError::Json(_))
    ));
}

#[test]
fn document_uses_tagged_path_elements() {
    let t = line3();
    let v = serde_json::to_value(t.plan.to_document()).unwrap();
    let path = &v["layers"][0]["routes"][0]["path"][0];
    assert_eq!(path["kind"], "link");
    assert_eq!(path["id"], t.l01.0);
    assert_eq!(v["layers"][0]["routing_type"], "source_routing");
}
