//! End-to-end tests for trace trees.
//!
//! These build trees the way instrumented code would and check the derived
//! status, timing and serialized shape.

use std::sync::Arc;

use calltrace::{
    Arg, ManualClock, NULL_MESSAGE, Status, Trace, TraceConfig, trace_message, trace_time,
};

struct OrderService;
struct Inventory;
struct PaymentGateway;

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::from_millis(1_768_125_600_000))
}

/// Simulates a request handler with nested calls.
fn place_order(clock: &ManualClock, root: &mut Trace, in_stock: bool) {
    root.parameter("order_id", "A-17");
    trace_time!(root, "validated");

    {
        let inventory = root.create_child_for::<Inventory>("reserve");
        inventory.parameter("sku", "WIDGET-1");
        clock.advance_ms(12);
        if !in_stock {
            trace_message!(inventory, "only %d left, wanted %d", 1, 3);
            inventory.set_status(Status::Warn);
        }
        inventory.finish();
    }

    {
        let payment = root.create_child_of(&PaymentGateway, "charge");
        let card = payment.create_child("CardNetwork", "authorize");
        clock.advance_ms(30);
        card.set_status(Status::Error);
        card.add_message("issuer unavailable");
        card.finish();
        payment.finish();
    }

    trace_time!(root, "charged");
    root.finish();
}

#[test]
fn test_request_tree_aggregates_first_non_ok() {
    let clock = start_clock();
    let mut root = Trace::builder("OrderService", "place_order")
        .clock(clock.clone())
        .log_time(true)
        .build();

    place_order(&clock, &mut root, false);

    assert_eq!(root.items.len(), 2);
    assert!(root.items[0].class_name.ends_with("Inventory"));
    assert!(root.items[1].class_name.ends_with("PaymentGateway"));

    // Warn from inventory comes before the error from payment.
    assert_eq!(root.status(), Status::Warn);
    assert!(root.has_warning());
    assert!(!root.has_error());
    assert!(root.items[1].has_error());

    assert_eq!(root.duration(), 42);
    assert_eq!(root.items[0].elapsed(), Some(12));
    assert_eq!(root.items[1].elapsed(), Some(30));
    assert_eq!(root.times, vec!["0:0 validated", "42:42 charged"]);
    assert_eq!(root.items[0].messages, vec!["only 1 left, wanted 3"]);
}

#[test]
fn test_error_propagates_when_nothing_earlier_fails() {
    let clock = start_clock();
    let mut root = Trace::builder("OrderService", "place_order")
        .clock(clock.clone())
        .build();

    place_order(&clock, &mut root, true);

    assert_eq!(root.status(), Status::Error);
    assert!(root.has_error());
    // Lap timing was never enabled.
    assert!(root.times.is_empty());
    assert!(root.items.iter().all(|item| item.times.is_empty()));
}

#[test]
fn test_log_time_inherited_from_config() {
    let config = TraceConfig::from_toml_str("[trace]\nlog_time = true").unwrap();
    let mut root = Trace::with_config("Batch", "run", &config);
    let child = root.create_child("Batch", "chunk");
    assert!(child.log_time);

    child.log_time("chunk started");
    child.log_time_with(Some("chunk %d done"), &[Arg::from(1)]);
    assert_eq!(child.times.len(), 2);

    let elapsed: Vec<u64> = child
        .times
        .iter()
        .map(|t| t.split(':').next().unwrap().parse().unwrap())
        .collect();
    assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
    assert!(child.times[1].ends_with(" chunk 1 done"));
}

#[test]
fn test_unfinished_trace_duration_is_non_negative() {
    let mut trace = Trace::for_type::<OrderService>("cancel");
    let first = trace.duration();
    assert!(trace.is_finished());
    assert_eq!(trace.elapsed(), Some(first));
    assert!(trace.end_time.unwrap() >= trace.start_time);
}

#[test]
fn test_misuse_never_panics() {
    let mut trace = Trace::new("Legacy", "handle");
    trace.add_message_with(None, &[Arg::from("ignored")]);
    trace.add_message_with(Some("%d and %d"), &[Arg::from(1)]);
    trace.add_message_with(Some("%z then %s"), &[Arg::from(1), Arg::from("next")]);
    trace.add_message_with(Some("payload={} size=%5d"), &[Arg::from(42)]);

    assert_eq!(
        trace.messages,
        vec![NULL_MESSAGE, "1 and %d", "1 then next", "payload={} size=   42"]
    );
}

#[test]
fn test_serialized_tree_shape() {
    let clock = start_clock();
    let mut root = Trace::builder("OrderService", "place_order")
        .clock(clock.clone())
        .log_time(true)
        .build();
    place_order(&clock, &mut root, false);

    let json = serde_json::to_value(&root).unwrap();
    assert_eq!(json["status"], "WARN");
    assert_eq!(json["duration"], 42);
    assert_eq!(json["items"][1]["status"], "ERROR");
    assert_eq!(json["items"][1]["items"][0]["className"], "CardNetwork");
    assert_eq!(json["items"][0]["parameters"]["sku"], "WIDGET-1");

    let restored: Trace = serde_json::from_value(json).unwrap();
    assert_eq!(restored.status(), Status::Warn);
    assert_eq!(restored.items[1].items[0].messages, vec!["issuer unavailable"]);
    assert_eq!(restored.elapsed(), Some(42));
}
