use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

lazy_static! {
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "school_logins_total",
        "Login attempts by tenant and outcome",
        &["tenant", "status"]
    ).unwrap();

    pub static ref MESSAGES_COUNTER: CounterVec = register_counter_vec!(
        "school_messages_sent_total",
        "Messages sent by tenant",
        &["tenant"]
    ).unwrap();

    pub static ref EVENTS_DELIVERED_COUNTER: CounterVec = register_counter_vec!(
        "school_realtime_events_delivered_total",
        "Real-time frames handed to open sockets, by event type",
        &["type"]
    ).unwrap();

    pub static ref OPEN_SOCKETS_GAUGE: IntGauge = register_int_gauge!(
        "school_realtime_open_sockets",
        "Authenticated real-time connections held by this process"
    ).unwrap();
}
