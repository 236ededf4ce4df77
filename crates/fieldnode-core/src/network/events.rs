use core::cell::{Cell, RefCell};
use core::ops::BitOr;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, error, info};

use crate::config::MAX_ACCESS_POINTS;

use super::{AccessPoint, ConnectionState, ScanReport};

/// Asynchronous notifications produced by the platform network stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// Outcome of an association request, `0` on success
    ConnectResult { status: i32 },
    /// Outcome of a disconnect request, `0` on success
    DisconnectResult { status: i32 },
    Ipv4AddrAdded,
    ScanResult(AccessPoint),
    ScanDone,
}

impl NetEvent {
    pub const fn class(&self) -> EventMask {
        match self {
            Self::ConnectResult { .. } => EventMask::CONNECT_RESULT,
            Self::DisconnectResult { .. } => EventMask::DISCONNECT_RESULT,
            Self::Ipv4AddrAdded => EventMask::IPV4_ADDR_ADD,
            Self::ScanResult(_) => EventMask::SCAN_RESULT,
            Self::ScanDone => EventMask::SCAN_DONE,
        }
    }
}

/// Set of event classes the hub reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: Self = Self(0);
    pub const CONNECT_RESULT: Self = Self(1 << 0);
    pub const DISCONNECT_RESULT: Self = Self(1 << 1);
    pub const IPV4_ADDR_ADD: Self = Self(1 << 2);
    pub const SCAN_RESULT: Self = Self(1 << 3);
    pub const SCAN_DONE: Self = Self(1 << 4);

    pub const WIFI_CONNECTION: Self = Self::CONNECT_RESULT.union(Self::DISCONNECT_RESULT);
    pub const WIFI_SCAN: Self = Self::SCAN_RESULT.union(Self::SCAN_DONE);
    pub const ALL: Self = Self::WIFI_CONNECTION
        .union(Self::IPV4_ADDR_ADD)
        .union(Self::WIFI_SCAN);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// What the connect waiter is woken with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectOutcome {
    Connected,
    Failed(i32),
}

#[derive(Debug, Default)]
struct ScanBuffer {
    access_points: heapless::Vec<AccessPoint, MAX_ACCESS_POINTS>,
    dropped: usize,
}

/// Shared state between the platform's event dispatch context and the
/// [`NetworkManager`](super::NetworkManager).
///
/// Each handler is a short critical-section write followed by a signal post,
/// so [`dispatch`](Self::dispatch) never blocks and is safe to call from any
/// executor or interrupt context. The hub is `const`-constructible and can
/// live in a `static`.
pub struct NetworkEvents {
    subscriptions: Mutex<CriticalSectionRawMutex, Cell<EventMask>>,
    state: Mutex<CriticalSectionRawMutex, Cell<ConnectionState>>,
    scan: Mutex<CriticalSectionRawMutex, RefCell<ScanBuffer>>,
    connect: Signal<CriticalSectionRawMutex, ConnectOutcome>,
    ipv4: Signal<CriticalSectionRawMutex, ()>,
    scan_done: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for NetworkEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkEvents {
    pub const fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Cell::new(EventMask::NONE)),
            state: Mutex::new(Cell::new(ConnectionState::Disconnected)),
            scan: Mutex::new(RefCell::new(ScanBuffer {
                access_points: heapless::Vec::new(),
                dropped: 0,
            })),
            connect: Signal::new(),
            ipv4: Signal::new(),
            scan_done: Signal::new(),
        }
    }

    /// Start reacting to the given event classes.
    ///
    /// Returns `false` when every class was already subscribed.
    pub fn subscribe(&self, mask: EventMask) -> bool {
        self.subscriptions.lock(|subs| {
            let current = subs.get();
            subs.set(current | mask);
            !current.contains(mask)
        })
    }

    pub fn subscriptions(&self) -> EventMask {
        self.subscriptions.lock(Cell::get)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock(Cell::get)
    }

    /// Entry point for the platform's event dispatch context.
    pub fn dispatch(&self, event: NetEvent) {
        if !self.subscriptions().contains(event.class()) {
            debug!("Ignoring unsubscribed network event {:?}", event);
            return;
        }

        match event {
            NetEvent::ConnectResult { status: 0 } => {
                info!("Wi-Fi connected.");
                self.set_state(ConnectionState::Connected);
                self.connect.signal(ConnectOutcome::Connected);
            }
            NetEvent::ConnectResult { status } => {
                error!("Error ({}): Connection request failed.", status);
                self.set_state(ConnectionState::Disconnected);
                self.connect.signal(ConnectOutcome::Failed(status));
            }
            NetEvent::DisconnectResult { status: 0 } => {
                info!("Wi-Fi disconnected.");
                self.set_state(ConnectionState::Disconnected);
                self.connect.reset();
                self.ipv4.reset();
            }
            NetEvent::DisconnectResult { status } => {
                error!("Error ({}): Disconnection request failed.", status);
            }
            NetEvent::Ipv4AddrAdded => {
                info!("IPv4 address assigned");
                self.set_state(ConnectionState::IpAssigned);
                self.ipv4.signal(());
            }
            NetEvent::ScanResult(ap) => self.scan.lock(|scan| {
                let mut scan = scan.borrow_mut();
                if let Err(ap) = scan.access_points.push(ap) {
                    debug!("Scan buffer full, dropping '{}'", ap.ssid_str());
                    scan.dropped += 1;
                }
            }),
            NetEvent::ScanDone => {
                info!("Wi-Fi scan completed.");
                self.scan_done.signal(());
            }
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.lock(|s| s.set(state));
    }

    /// Move to `next` only if the current state is still `expected`.
    pub(crate) fn transition(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        self.state.lock(|s| {
            if s.get() == expected {
                s.set(next);
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn clear_connect(&self) {
        self.connect.reset();
    }

    pub(crate) fn is_connect_signaled(&self) -> bool {
        self.connect.signaled()
    }

    pub(crate) async fn wait_connect(&self) -> ConnectOutcome {
        self.connect.wait().await
    }

    /// Drop an address event nobody waited for, so the next wait needs a new lease.
    pub(crate) fn clear_ipv4(&self) {
        self.ipv4.reset();
    }

    pub(crate) fn is_ipv4_signaled(&self) -> bool {
        self.ipv4.signaled()
    }

    pub(crate) async fn wait_ipv4(&self) {
        self.ipv4.wait().await
    }

    /// Forget the previous scan before a new one is requested.
    pub(crate) fn begin_scan(&self) {
        self.scan_done.reset();
        self.scan.lock(|scan| {
            let mut scan = scan.borrow_mut();
            scan.access_points.clear();
            scan.dropped = 0;
        });
    }

    pub(crate) async fn wait_scan_done(&self) {
        self.scan_done.wait().await
    }

    pub(crate) fn scan_report(&self) -> ScanReport {
        self.scan.lock(|scan| {
            let scan = scan.borrow();
            ScanReport {
                access_points: scan.access_points.clone(),
                dropped: scan.dropped,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribed() -> NetworkEvents {
        let events = NetworkEvents::new();
        events.subscribe(EventMask::ALL);
        events
    }

    fn ap(n: u8) -> AccessPoint {
        AccessPoint::new(&[b'a', b'p', b'0' + n], -30 - n as i8, super::super::Security::Psk)
    }

    #[test]
    fn test_mask_union_and_contains() {
        let mask = EventMask::CONNECT_RESULT | EventMask::SCAN_DONE;
        assert!(mask.contains(EventMask::CONNECT_RESULT));
        assert!(mask.contains(EventMask::SCAN_DONE));
        assert!(!mask.contains(EventMask::WIFI_SCAN));
        assert!(EventMask::ALL.contains(mask));
        assert!(EventMask::NONE.is_empty());
    }

    #[test]
    fn test_subscribe_reports_new_classes_only() {
        let events = NetworkEvents::new();
        assert!(events.subscribe(EventMask::WIFI_CONNECTION));
        assert!(!events.subscribe(EventMask::CONNECT_RESULT));
        assert!(events.subscribe(EventMask::WIFI_SCAN));
        assert_eq!(
            events.subscriptions(),
            EventMask::WIFI_CONNECTION | EventMask::WIFI_SCAN
        );
    }

    #[test]
    fn test_unsubscribed_events_are_ignored() {
        let events = NetworkEvents::new();
        events.subscribe(EventMask::WIFI_SCAN);

        events.dispatch(NetEvent::ConnectResult { status: 0 });
        assert_eq!(events.connection_state(), ConnectionState::Disconnected);
        assert!(!events.is_connect_signaled());
    }

    #[test]
    fn test_connect_success_signals_waiter() {
        let events = subscribed();
        events.dispatch(NetEvent::ConnectResult { status: 0 });
        assert_eq!(events.connection_state(), ConnectionState::Connected);
        assert!(events.is_connect_signaled());
    }

    #[test]
    fn test_connect_failure_signals_distinct_outcome() {
        let events = subscribed();
        events.set_state(ConnectionState::Connecting);
        events.dispatch(NetEvent::ConnectResult { status: -113 });
        assert_eq!(events.connection_state(), ConnectionState::Disconnected);
        assert_eq!(events.connect.try_take(), Some(ConnectOutcome::Failed(-113)));
    }

    #[test]
    fn test_disconnect_clears_connect_signal() {
        let events = subscribed();
        events.dispatch(NetEvent::ConnectResult { status: 0 });
        events.dispatch(NetEvent::DisconnectResult { status: 0 });
        assert_eq!(events.connection_state(), ConnectionState::Disconnected);
        assert!(!events.is_connect_signaled());
    }

    #[test]
    fn test_disconnect_drops_pending_address() {
        let events = subscribed();
        events.dispatch(NetEvent::ConnectResult { status: 0 });
        events.dispatch(NetEvent::Ipv4AddrAdded);
        assert!(events.is_ipv4_signaled());

        events.dispatch(NetEvent::DisconnectResult { status: 0 });
        assert!(!events.is_ipv4_signaled());
    }

    #[test]
    fn test_failed_disconnect_keeps_connection() {
        let events = subscribed();
        events.dispatch(NetEvent::ConnectResult { status: 0 });
        events.dispatch(NetEvent::DisconnectResult { status: 5 });
        assert_eq!(events.connection_state(), ConnectionState::Connected);
        assert!(events.is_connect_signaled());
    }

    #[test]
    fn test_scan_overflow_keeps_first_entries() {
        let events = subscribed();
        events.begin_scan();
        for n in 0..13 {
            events.dispatch(NetEvent::ScanResult(ap(n)));
        }
        events.dispatch(NetEvent::ScanDone);

        let report = events.scan_report();
        assert_eq!(report.len(), MAX_ACCESS_POINTS);
        assert_eq!(report.dropped, 3);
        for (n, entry) in report.access_points.iter().enumerate() {
            assert_eq!(entry, &ap(n as u8));
        }
    }

    #[test]
    fn test_begin_scan_discards_previous_results() {
        let events = subscribed();
        for n in 0..12 {
            events.dispatch(NetEvent::ScanResult(ap(n)));
        }
        events.dispatch(NetEvent::ScanDone);

        events.begin_scan();
        assert!(events.scan_report().is_empty());
        assert_eq!(events.scan_report().dropped, 0);
        assert!(!events.scan_done.signaled());
    }

    #[test]
    fn test_transition_only_from_expected_state() {
        let events = subscribed();
        events.set_state(ConnectionState::Connecting);
        assert!(events.transition(ConnectionState::Connecting, ConnectionState::Disconnected));
        assert!(!events.transition(ConnectionState::Connecting, ConnectionState::Connected));
        assert_eq!(events.connection_state(), ConnectionState::Disconnected);
    }
}
