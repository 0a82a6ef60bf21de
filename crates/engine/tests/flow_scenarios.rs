use formflow_engine::{Address, Branch, Environment, Flow, FlowSession, NodeKind, Selector, Stop, Submission, parse_flow_str};
use indexmap::indexmap;
use serde_json::{Map, Value, json};

fn environment(bindings: indexmap::IndexMap<&str, Value>) -> Environment {
    bindings.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

fn values(bindings: indexmap::IndexMap<&str, Value>) -> Map<String, Value> {
    bindings.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

fn branching_flow() -> Flow {
    parse_flow_str(
        r#"
- form:
    defaults: { x: 0 }
    presentation: A
- cond:
    if: "x > 0"
    then:
      - form:
          defaults: {}
          presentation: B
    else:
      - return: neg
"#,
    )
    .expect("load branching flow")
}

fn counting_flow() -> Flow {
    parse_flow_str(
        r#"
- loop:
    while: "n < 3"
    do:
      - variables: { n: "${{ n + 1 }}" }
      - form:
          defaults: {}
          presentation: A
- return: done
"#,
    )
    .expect("load counting flow")
}

#[test]
fn initial_lands_on_an_input_node() {
    for flow in [branching_flow(), counting_flow()] {
        let start = environment(indexmap! { "n" => json!(0) });
        let point = flow.initial_with(start).expect("initial point");
        let node = flow.root().resolve(point.address()).expect("resolve initial address");
        assert_eq!(node.kind(), NodeKind::Input);
    }
}

#[test]
fn condition_routes_to_exactly_one_branch() {
    let flow = branching_flow();
    let first = flow.initial().expect("initial point");
    assert_eq!(first.address(), &Address::from(vec![Selector::Index(0)]));
    assert_eq!(first.value().presentation, json!("A"));

    let (settled, stop) = flow.next(&first, &values(indexmap! { "x" => json!(5) })).expect("positive branch");
    assert_eq!(settled.value().defaults, values(indexmap! { "x" => json!(5) }));
    let next = stop.as_input().expect("input B");
    assert_eq!(next.value().presentation, json!("B"));
    assert_eq!(
        next.address(),
        &Address::from(vec![Selector::Index(1), Selector::Branch(Branch::Then, 0)])
    );

    let (_, stop) = flow.next(&first, &values(indexmap! { "x" => json!(-1) })).expect("negative branch");
    assert_eq!(stop.as_terminal().map(|point| point.value().clone()), Some(json!("neg")));
    assert_eq!(
        stop.address(),
        &Address::from(vec![Selector::Index(1), Selector::Branch(Branch::Else, 0)])
    );
}

#[test]
fn leaving_a_branch_never_visits_the_other_one() {
    let flow = parse_flow_str(
        r#"
- form: {}
- cond:
    if: "${{ pick }}"
    then: [{ form: { presentation: then } }]
    else: [{ form: { presentation: else } }]
- return: "${{ pick }}"
"#,
    )
    .expect("load flow");
    let first = flow.initial().expect("initial point");

    let (_, stop) = flow.next(&first, &values(indexmap! { "pick" => json!(true) })).expect("then branch");
    let then_point = stop.as_input().expect("then input").clone();
    assert_eq!(then_point.value().presentation, json!("then"));

    let (_, stop) = flow.next(&then_point, &Map::new()).expect("leave branch");
    assert_eq!(stop.as_terminal().map(|point| point.value().clone()), Some(json!(true)));
}

#[test]
fn bindings_are_absorbed_transparently() {
    let with_bindings = parse_flow_str(
        r#"
- variables: { x: 1 }
- variables: { y: "${{ x + 1 }}", x: 10 }
- form:
    defaults: { total: "${{ x + y }}" }
"#,
    )
    .expect("load flow with bindings");
    let without_bindings = parse_flow_str("- form:\n    defaults: { total: \"${{ x + y }}\" }\n").expect("load bare flow");

    let absorbed = with_bindings.initial().expect("initial with bindings");
    let seeded = without_bindings
        .initial_with(environment(indexmap! { "x" => json!(10), "y" => json!(2) }))
        .expect("initial with seed");

    assert_eq!(absorbed.value(), seeded.value());
    assert_eq!(absorbed.environment(), seeded.environment());
    assert_eq!(absorbed.value().defaults["total"], json!(12));
    assert_eq!(absorbed.address(), &Address::from(vec![Selector::Index(2)]));
}

#[test]
fn leading_binding_is_visible_in_the_first_input() {
    let flow = parse_flow_str("- variables: { x: 1 }\n- form: {}\n").expect("load flow");
    let point = flow.initial().expect("initial point");
    assert_eq!(point.environment().get("x"), Some(&json!(1)));
    assert_eq!(point.address(), &Address::from(vec![Selector::Index(1)]));
}

#[test]
fn loop_runs_until_its_predicate_flips() {
    let flow = counting_flow();
    let mut point = flow
        .initial_with(environment(indexmap! { "n" => json!(0) }))
        .expect("initial point");
    let mut counters = vec![point.environment().get("n").cloned()];

    let stop = loop {
        let (_, stop) = flow.next(&point, &Map::new()).expect("advance through loop");
        match stop {
            Stop::Input(next) => {
                counters.push(next.environment().get("n").cloned());
                point = next;
            }
            terminal @ Stop::Terminal(_) => break terminal,
        }
    };

    assert_eq!(counters, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
    assert_eq!(stop.as_terminal().map(|point| point.value().clone()), Some(json!("done")));
    assert_eq!(stop.as_terminal().and_then(|point| point.environment().get("n").cloned()), Some(json!(3)));
}

#[test]
fn loop_false_at_entry_skips_its_body() {
    let flow = parse_flow_str(
        r#"
- form: {}
- loop:
    while: "n < 3"
    do:
      - form: { presentation: body }
- return: "${{ n }}"
"#,
    )
    .expect("load flow");
    let first = flow.initial().expect("initial point");
    let (_, stop) = flow.next(&first, &values(indexmap! { "n" => json!(7) })).expect("skip loop");
    assert_eq!(stop.as_terminal().map(|point| point.value().clone()), Some(json!(7)));
}

#[test]
fn next_is_deterministic() {
    let flow = counting_flow();
    let first = flow
        .initial_with(environment(indexmap! { "n" => json!(0) }))
        .expect("initial point");
    let submitted = values(indexmap! { "note" => json!("same") });

    let once = flow.next(&first, &submitted).expect("first call");
    let twice = flow.next(&first, &submitted).expect("second call");
    assert_eq!(once, twice);
}

#[test]
fn stepping_back_and_replaying_reproduces_the_walk() {
    let flow = parse_flow_str(
        r#"
- form:
    defaults: { count: 0 }
    validators:
      count: [["count >= 0", "Count cannot be negative"]]
- variables: { remaining: "${{ count }}", items: [] }
- loop:
    while: "remaining > 0"
    do:
      - form:
          defaults: { item: "" }
          presentation: "Item ${{ count - remaining + 1 }} of ${{ count }}"
      - variables: { remaining: "${{ remaining - 1 }}", items: "${{ items + [item] }}" }
- return: { items: "${{ items }}" }
"#,
    )
    .expect("load flow");

    let submissions = [
        values(indexmap! { "count" => json!(2) }),
        values(indexmap! { "item" => json!("apple") }),
        values(indexmap! { "item" => json!("pear") }),
    ];

    let mut session = FlowSession::start(&flow).expect("start session");
    let rejected = session.submit(values(indexmap! { "count" => json!(-1) })).expect("validate");
    assert!(matches!(rejected, Submission::Rejected(ref errors) if errors.len() == 1));

    let mut forward = Vec::new();
    for submission in submissions.clone() {
        forward.push(session.submit(submission).expect("forward step"));
    }
    assert_eq!(forward.last(), Some(&Submission::Finished(json!({ "items": ["apple", "pear"] }))));
    let shown: Vec<_> = session.history().map(|point| point.value().presentation.clone()).collect();
    assert_eq!(shown, vec![Value::Null, json!("Item 1 of 2"), json!("Item 2 of 2")]);

    while session.back() {}
    assert_eq!(session.depth(), 1);
    assert_eq!(session.current().value().defaults, submissions[0]);

    let mut replayed = Vec::new();
    for submission in submissions {
        replayed.push(session.submit(submission).expect("replayed step"));
    }
    assert_eq!(forward, replayed);
}
