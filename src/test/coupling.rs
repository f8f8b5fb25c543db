use super::{no_attrs, plan};
use crate::net::{NetPlanError, PathElement};

#[test]
fn lower_layer_failure_zeroes_upper_link_capacity() {
    let mut p = plan();
    let wdm = p.default_layer();
    let ip = p.add_layer("IP", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let fiber = p.add_link(wdm, a, b, 400.0, 80.0, 200_000.0, no_attrs()).unwrap();
    let lp = p.add_demand(wdm, a, b, 100.0, no_attrs()).unwrap();
    p.add_route(lp, 100.0, 100.0, vec![PathElement::Link(fiber)], Default::default(), no_attrs())
        .unwrap();
    let ip_link = p.couple_to_new_link_created(lp, ip).unwrap();
    assert_eq!(p.link(ip_link).unwrap().capacity(), 100.0);
    assert_eq!(p.link(ip_link).unwrap().coupled_demand(), Some(lp));
    assert!(p.coupling_dag().is_coupled(wdm, ip));

    p.set_link_failure_state(fiber, false).unwrap();
    assert_eq!(p.link(ip_link).unwrap().capacity(), 0.0);
    p.set_link_failure_state(fiber, true).unwrap();
    assert_eq!(p.link(ip_link).unwrap().capacity(), 100.0);

    p.set_offered_traffic(lp, 40.0).unwrap();
    // 承载流量由路由决定，与 offered 无关
    assert_eq!(p.link(ip_link).unwrap().capacity(), 100.0);
    let r = *p.demand(lp).unwrap().routes().iter().next().unwrap();
    p.set_route_carried_traffic(r, 40.0, 40.0).unwrap();
    assert_eq!(p.link(ip_link).unwrap().capacity(), 40.0);
    p.check_caches_consistency().unwrap();
}

#[test]
fn new_demand_created_below_an_existing_link() {
    let mut p = plan();
    let upper = p.default_layer();
    let lower = p.add_layer("lower", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let e = p.add_link(upper, a, b, 50.0, 1.0, 200_000.0, no_attrs()).unwrap();

    let d = p.couple_to_new_demand_created(e, lower).unwrap();
    let demand = p.demand(d).unwrap();
    assert_eq!((demand.ingress(), demand.egress()), (a, b));
    assert_eq!(demand.layer(), lower);
    assert_eq!(demand.coupled_link(), Some(e));
    // 新需求尚无路由，链路容量随之为 0
    assert_eq!(p.link(e).unwrap().capacity(), 0.0);
    assert_eq!(p.coupling_dag().upper_layers(lower), vec![upper]);
}

#[test]
fn removing_either_end_dissolves_the_coupling() {
    let mut p = plan();
    let lower = p.default_layer();
    let upper = p.add_layer("upper", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let d = p.add_demand(lower, a, b, 1.0, no_attrs()).unwrap();
    let e = p.couple_to_new_link_created(d, upper).unwrap();

    p.remove_link(e).unwrap();
    assert!(p.demand(d).unwrap().coupled_link().is_none());
    assert!(!p.coupling_dag().is_coupled(lower, upper));

    let e2 = p.couple_to_new_link_created(d, upper).unwrap();
    p.remove_demand(d).unwrap();
    assert!(p.link(e2).unwrap().coupled_demand().is_none());
    p.set_link_capacity(e2, 3.0).unwrap();
    p.check_caches_consistency().unwrap();
}

#[test]
fn coupling_preconditions() {
    let mut p = plan();
    let lower = p.default_layer();
    let upper = p.add_layer("upper", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let odd = p.add_layer("odd", "", "Gbps", "wavelengths", no_attrs()).unwrap();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let c = p.add_node("c", 2.0, 0.0, no_attrs()).unwrap();
    let d = p.add_demand(lower, a, b, 1.0, no_attrs()).unwrap();

    let same_layer = p.add_link(lower, a, b, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(d, same_layer), Err(NetPlanError::Coupling(_))));

    let wrong_ends = p.add_link(upper, a, c, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(d, wrong_ends), Err(NetPlanError::Coupling(_))));

    let wrong_units = p.add_link(odd, a, b, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(d, wrong_units), Err(NetPlanError::Coupling(_))));

    let ok = p.add_link(upper, a, b, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    p.couple(d, ok).unwrap();
    let ok2 = p.add_link(upper, a, b, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(d, ok2), Err(NetPlanError::Coupling(_))));
    let d2 = p.add_demand(lower, a, b, 1.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(d2, ok), Err(NetPlanError::Coupling(_))));

    assert!(matches!(p.decouple_demand(d2), Err(NetPlanError::Coupling(_))));
    p.decouple_demand(d).unwrap();
    assert!(p.coupling_dag().couplings(lower, upper).is_none_or(|s| s.is_empty()));
}
