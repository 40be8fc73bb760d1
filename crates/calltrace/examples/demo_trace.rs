//! Demo of call tracing over a simulated checkout -> inventory -> payment flow.

use std::time::Duration;

use calltrace::{Status, Trace, TraceConfig, trace_message, trace_time};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

struct CheckoutHandler;
struct Inventory;

fn simulate_reservation(parent: &mut Trace, sku: &str, wanted: u32, available: u32) {
    let reservation = parent.create_child_for::<Inventory>("reserve");
    reservation.parameter("sku", sku);
    reservation.parameter("quantity", wanted.to_string());

    // Simulate some work
    std::thread::sleep(Duration::from_millis(5));
    trace_time!(reservation, "stock checked");

    if available < wanted {
        trace_message!(reservation, "only %d of %d available", available, wanted);
        reservation.set_status(Status::Warn);
    }
    reservation.finish();
}

fn simulate_payment(parent: &mut Trace, amount: f64) {
    let payment = parent.create_child("PaymentGateway", "charge");
    trace_message!(payment, "charging %.2f EUR", amount);

    let authorize = payment.create_child("CardNetwork", "authorize");
    std::thread::sleep(Duration::from_millis(15));
    authorize.finish();

    std::thread::sleep(Duration::from_millis(3));
    payment.finish();
}

fn simulate_request(trace: &mut Trace) -> String {
    trace.parameter("customer", "c-1029");
    trace_time!(trace, "request parsed");

    simulate_reservation(trace, "WIDGET-1", 2, 5);
    simulate_reservation(trace, "GADGET-7", 3, 1);
    trace_time!(trace, "inventory reserved");

    simulate_payment(trace, 59.90);
    trace_time!(trace, "payment captured");

    trace.finish();
    "order A-17 accepted".to_string()
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Lap timing on, as a host application would set in its config file
    let config = TraceConfig::from_toml_str("[trace]\nlog_time = true")?;
    let mut trace = Trace::builder(std::any::type_name::<CheckoutHandler>(), "checkout")
        .config(&config)
        .build();

    let result = simulate_request(&mut trace);

    // Print summary
    println!("Request result: {}", result);
    println!("Status: {}", trace.status());
    println!("Duration: {}ms", trace.duration());
    println!("Calls: {}", trace.items.len());

    // Print the trace as JSON for inspection
    println!("\n--- Full Trace JSON ---");
    println!("{}", serde_json::to_string_pretty(&trace)?);

    Ok(())
}
