use statetree_core::machine::Phase;
use statetree_walk::demo::{self, DemoState};
use statetree_walk::script::{run, Step};

#[test]
fn default_walk_matches_reference_scenario() {
    let mut tree = demo::build().unwrap();
    tree.start().unwrap();

    let steps = Step::parse_list("A2,C,history:A").unwrap();
    let reports = run(&mut tree, &steps).unwrap();
    let leaves: Vec<_> = reports
        .iter()
        .map(|r| *r.active_path.last().unwrap())
        .collect();
    assert_eq!(leaves, [DemoState::A2, DemoState::C, DemoState::A2]);

    let log = &tree.controllable().unwrap().lines;
    let tail = &log[log.len() - 3..];
    assert_eq!(tail, ["exit C", "enter A (History { deep: false })", "enter A2 (History { deep: false })"]);
}

#[test]
fn stop_and_restart_keep_the_walk_going() {
    let mut tree = demo::build().unwrap();
    tree.start().unwrap();

    let steps = Step::parse_list("point:A:2,stop,reset,start,deep:A").unwrap();
    let reports = run(&mut tree, &steps).unwrap();

    assert_eq!(reports[0].active_path, [DemoState::Root, DemoState::A, DemoState::B]);
    assert!(reports[1].active_path.is_empty());
    assert_eq!(reports[1].describe(), "Stop: (stopped)");
    // Instances were rebuilt on restart: A only remembers A1 from the new start.
    assert_eq!(reports[4].active_path.last(), Some(&DemoState::A1));
    assert_eq!(tree.phase(), Phase::Started);
}

#[test]
fn engine_errors_stop_the_walk() {
    let mut tree = demo::build().unwrap();
    tree.start().unwrap();

    let steps = Step::parse_list("C,reset").unwrap();
    let err = run(&mut tree, &steps).unwrap_err();
    assert_eq!(err.kind, statetree_core::error::ErrorKind::InvalidTransition);
    assert_eq!(tree.current_leaf(), Some(DemoState::C));
}

#[test]
fn faults_are_recorded_but_do_not_stop_the_walk() {
    let mut tree = demo::build().unwrap();
    tree.start().unwrap();

    let steps = Step::parse_list("A1,point:A:7,event:back").unwrap();
    let reports = run(&mut tree, &steps).unwrap();
    assert_eq!(reports.len(), 3);

    let faults: Vec<_> = tree
        .controllable()
        .unwrap()
        .lines
        .iter()
        .filter(|line| line.starts_with("fault"))
        .cloned()
        .collect();
    assert_eq!(
        faults,
        [
            "fault state re-entered in state A1",
            "fault unhandled entry point in state A (entry point 7)",
            "fault unhandled event in state A1",
        ]
    );
}
