//! Group lifecycle, membership and the control surface.

use faultpoint_core::{
    fault_site, Address, ErrorClass, FaultClass, FaultError, FaultInjector, FaultKind, FaultPlan,
    FaultSite, GroupId, Response, MAX_GROUPS,
};

fn site(line: u32) -> FaultSite {
    FaultSite::new(FaultClass::Check, "cache::evict", "src/cache.rs", line, 3)
}

#[test]
fn lifecycle_conflicts() {
    let injector = FaultInjector::default();
    let id = injector.create_group(12).unwrap();
    assert_eq!(injector.create_group(12), Err(FaultError::GroupExists(12)));
    injector.delete_group(id).unwrap();
    assert_eq!(injector.delete_group(id), Err(FaultError::UnknownGroup(12)));
    assert_eq!(
        injector.create_group(-1).unwrap_err().class(),
        ErrorClass::Validation
    );
}

#[test]
fn capacity_of_256() {
    let injector = FaultInjector::default();
    for _ in 0..MAX_GROUPS {
        injector.create_next_group().unwrap();
    }
    let err = injector.create_next_group().unwrap_err();
    assert_eq!(err, FaultError::AllGroupsTaken);
    assert_eq!(err.class(), ErrorClass::Capacity);

    injector.delete_group(GroupId::from(77)).unwrap();
    assert_eq!(injector.create_next_group().unwrap(), GroupId::from(77));
}

#[test]
fn cross_group_assignment_conflicts() {
    let injector = FaultInjector::default();
    let point = injector.register(site(1)).unwrap();
    let a = injector.create_group(0).unwrap();
    let b = injector.create_group(1).unwrap();
    injector.add_fault_point(a, point.address()).unwrap();

    let err = injector.add_fault_point(b, point.address()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);
    assert_eq!(point.group_id(), Some(a));
    assert!(injector.group_fault_points(b).unwrap().is_empty());

    // Re-adding to the same group is a conflict too.
    assert!(injector.add_fault_point(a, point.address()).is_err());
    assert_eq!(injector.group_fault_points(a).unwrap().len(), 1);
}

#[test]
fn delete_detaches_members() {
    let injector = FaultInjector::default();
    let points: Vec<_> = (1..=3).map(|l| injector.register(site(l)).unwrap()).collect();
    let group = injector.create_group(2).unwrap();
    for point in &points {
        injector.add_fault_point(group, point.address()).unwrap();
    }
    injector.set_enabled(group, FaultKind::Delay, true).unwrap();
    assert!(points.iter().all(|p| p.is_armed()));

    injector.delete_group(group).unwrap();
    for point in &points {
        assert_eq!(point.group_id(), None);
        assert!(!point.is_armed());
    }
    let rows: Vec<String> = injector
        .list_fault_points()
        .map(|info| info.to_string())
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.starts_with("--- ----- check ")), "{rows:?}");

    // The freed points can join a new group.
    let again = injector.create_group(2).unwrap();
    injector.add_fault_point(again, points[0].address()).unwrap();
}

#[test]
fn boundaries_rejected_through_commands() {
    let injector = FaultInjector::default();
    injector.execute("create 0").unwrap();
    for line in [
        "write 0/error/times 0",
        "write 0/error/times -2",
        "write 0/error/probability 0",
        "write 0/error/probability 101",
        "write 0/delay/interval 0",
    ] {
        let err = injector.execute(line).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "{line}");
    }
    assert_eq!(injector.execute("read 0/error/times").unwrap().to_string(), "-1");
    assert_eq!(
        injector.execute("read 0/error/probability").unwrap().to_string(),
        "100"
    );
    assert_eq!(injector.execute("read 0/delay/interval").unwrap().to_string(), "1");
}

#[test]
fn scripted_session() {
    let injector = FaultInjector::default();
    let point = injector.register(fault_site!(FaultClass::Int)).unwrap();
    let address = point.address();

    let script = [
        "create 0".to_string(),
        format!("0/add {address}"),
        "write 0/error/errors EIO".to_string(),
        "write 0/error/times 3".to_string(),
        "write 0/error/enabled Y".to_string(),
    ];
    for line in &script {
        injector.execute(line).unwrap();
    }
    for _ in 0..5 {
        point.call_int(|| 0);
    }

    assert_eq!(injector.execute("read 0/error/hits").unwrap().to_string(), "5");
    assert_eq!(injector.execute("read 0/error/injected").unwrap().to_string(), "3");
    assert_eq!(injector.execute("read 0/error/times").unwrap().to_string(), "0");

    let Response::Report(report) = injector.execute("report").unwrap() else {
        panic!("expected a report");
    };
    assert_eq!(report.total_injected(), 3);
}

#[test]
fn json_plan_end_to_end() {
    let injector = FaultInjector::default();
    let point = injector.register(site(9)).unwrap();
    let json = format!(
        r#"{{
            "groups": [
                {{ "points": ["{}"], "error": {{ "errors": "ENOSPC,EAGAIN" }} }},
                {{ "id": 200, "panic": {{ "enabled": false }} }}
            ]
        }}"#,
        point.address()
    );
    let plan = FaultPlan::from_json(&json).unwrap();
    let created = injector.apply_plan(&plan).unwrap();
    assert_eq!(created, vec![GroupId::from(0), GroupId::from(200)]);
    assert!(point.is_armed());
    assert_eq!(
        injector.execute("read 0/error/errors").unwrap().to_string(),
        "-ENOSPC,-EAGAIN"
    );

    // Unknown member: nothing is left behind.
    let bad = FaultPlan::from_json(r#"{"groups": [{"points": ["0x1"]}]}"#).unwrap();
    assert_eq!(
        injector.apply_plan(&bad),
        Err(FaultError::UnknownAddress(Address(1)))
    );
    assert_eq!(injector.groups().len(), 2);
}
