#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pagefit_core::{
    EventTarget, HeadlessHost, HostEvent, PageFitConfig, PlatformProbe, Route, Session,
    SessionPhase, TouchSample,
};

const PATHS: [&str; 5] = ["/", "/a", "/a?x=1", "/b#frag", "//weird"];

#[derive(Debug, Arbitrary)]
enum Op {
    Resize(u16),
    Focus,
    ViewportResize,
    ViewportScroll,
    Orientation,
    Scroll(i16),
    TouchStart { y: i16, touches: u8, cancelable: bool },
    TouchMove { y: i16, touches: u8, cancelable: bool },
    Mounted,
    PageFinish(Option<u8>),
    Navigate(u8),
    Frames,
    Unmount,
}

#[derive(Debug, Arbitrary)]
struct Input {
    apple_touch: bool,
    collector: bool,
    native_collector: bool,
    queue_support: bool,
    ops: Vec<Op>,
}

fn route(i: u8) -> Route {
    Route::new(PATHS[usize::from(i) % PATHS.len()])
}

fn touch(y: i16, touches: u8, cancelable: bool) -> TouchSample {
    TouchSample {
        touch_count: usize::from(touches % 4),
        client_y: f64::from(y),
        cancelable,
    }
}

fuzz_target!(|input: Input| {
    let mut host = HeadlessHost::new().with_queue_support(input.queue_support);
    if input.apple_touch {
        host = host.with_platform(PlatformProbe::new("Macintosh", "MacIntel", true));
    }
    if input.native_collector {
        host = host.with_collector_function();
    }
    let config = if input.collector {
        PageFitConfig::with_collector("G-FUZZ")
    } else {
        PageFitConfig::default()
    };
    let mut session = Session::new(config);
    session.attach(&mut host);

    let mut torn_down = false;
    for op in input.ops.iter().take(256) {
        let commands_before = host.collector_commands().len();
        let writes_before = host.style_writes();

        match op {
            Op::Resize(h) => {
                host.set_inner_height(f64::from(*h));
                host.fire(&mut session, EventTarget::Window, HostEvent::Resize);
            }
            Op::Focus => {
                host.fire(&mut session, EventTarget::Window, HostEvent::Focus);
            }
            Op::ViewportResize => {
                host.fire(&mut session, EventTarget::VisualViewport, HostEvent::Resize);
            }
            Op::ViewportScroll => {
                host.fire(&mut session, EventTarget::VisualViewport, HostEvent::Scroll);
            }
            Op::Orientation => {
                host.fire(&mut session, EventTarget::Window, HostEvent::OrientationChange);
            }
            Op::Scroll(y) => {
                host.set_scroll_y(f64::from(*y));
                host.fire(&mut session, EventTarget::Window, HostEvent::Scroll);
            }
            Op::TouchStart { y, touches, cancelable } => {
                let verdict = host.fire(
                    &mut session,
                    EventTarget::Window,
                    HostEvent::TouchStart(touch(*y, *touches, *cancelable)),
                );
                assert!(!verdict.prevents_default(), "touchstart must stay passive");
            }
            Op::TouchMove { y, touches, cancelable } => {
                let sample = touch(*y, *touches, *cancelable);
                let verdict =
                    host.fire(&mut session, EventTarget::Window, HostEvent::TouchMove(sample));
                if verdict.prevents_default() {
                    assert!(input.apple_touch);
                    assert!(sample.is_single_touch());
                    assert!(sample.cancelable);
                }
            }
            Op::Mounted => {
                host.fire(&mut session, EventTarget::App, HostEvent::AppMounted);
            }
            Op::PageFinish(i) => {
                let route = i.map(route);
                host.fire(&mut session, EventTarget::App, HostEvent::PageFinish { route });
            }
            Op::Navigate(i) => {
                let route = route(*i);
                host.navigate(route.clone());
                host.fire(&mut session, EventTarget::Router, HostEvent::AfterNavigate { route });
            }
            Op::Frames => {
                host.run_frames(&mut session);
            }
            Op::Unmount => {
                host.fire(&mut session, EventTarget::App, HostEvent::BeforeUnmount);
                torn_down = true;
            }
        }

        if torn_down {
            assert_eq!(session.phase(), SessionPhase::TornDown);
            assert_eq!(host.active_listener_count(), 0);
            assert_eq!(host.pending_frame_count(), 0);
            if !matches!(op, Op::Unmount) {
                assert_eq!(host.collector_commands().len(), commands_before);
                assert_eq!(host.style_writes(), writes_before);
            }
        }
        if !input.collector {
            assert!(host.collector_commands().is_empty());
            assert!(!host.command_queue_created());
        }
    }

    let views = host.page_views();
    for pair in views.windows(2) {
        assert_ne!(pair[0].page_path, pair[1].page_path, "duplicate page view");
    }
});
