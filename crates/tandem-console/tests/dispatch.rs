use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tandem_console::consoles::Cell;
use tandem_console::{
    CanvasConsole, ConsoleClass, ConsoleError, ConsoleHost, ConsoleMethod, ConsoleRegistry,
    DebugConsole, TandemConfig, TerminalConsole, WorkerEndpoint,
};
use tandem_d2d::{DrawError, ImageDataMode, Instruction, RecordingSurface};
use tandem_ipc::{CircularBufferError, EventQueueError};
use tandem_mem::{Arena, Heap, Memory, MemoryError, SharedMemory, VecMemory};

const DEBUG: i32 = 1;
const TERM: i32 = 2;
const CANVAS: i32 = 3;
const HEAP_BASE: u32 = 0x8000;

struct Setup {
    host: ConsoleHost,
    worker: WorkerEndpoint,
    mem: VecMemory,
}

fn setup() -> Setup {
    let mut registry = ConsoleRegistry::new();
    assert_eq!(registry.register(Box::new(DebugConsole::new())), DEBUG);
    assert_eq!(
        registry
            .register_named("stdio", Box::new(TerminalConsole::new(40, 10)))
            .unwrap(),
        TERM
    );
    assert_eq!(
        registry
            .register_named(
                "canvas",
                Box::new(CanvasConsole::new(
                    RecordingSurface::new(64, 48),
                    ImageDataMode::Copy
                )),
            )
            .unwrap(),
        CANVAS
    );
    let host = ConsoleHost::new(registry, &TandemConfig::default()).unwrap();
    let worker =
        WorkerEndpoint::from_bundle(&host.proxy_bundle(), Heap::new(HEAP_BASE, 0x1000)).unwrap();
    Setup {
        host,
        worker,
        mem: VecMemory::new(0x10000),
    }
}

#[derive(Clone)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let writer = Capture(buf.clone());
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buf.lock().unwrap()).into_owned();
    (out, logs)
}

#[test]
fn fire_and_forget_calls_apply_in_order() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();
    mem.write_cstr(0x100, "hi").unwrap();
    mem.write_u32(0x200, 'A' as u32).unwrap();
    mem.write_u32(0x204, 'B' as u32).unwrap();

    worker.dispatch(&mem, TERM, "putStr", &[0x100, 65001]).unwrap();
    worker.dispatch(&mem, TERM, "charOut", &['!' as u32, 65001]).unwrap();
    worker.dispatch(&mem, TERM, "setColors", &[0x00FF00, 0x000000]).unwrap();
    worker.dispatch(&mem, TERM, "setRange", &[0x200, 40, 2]).unwrap();
    worker.dispatch(&mem, TERM, "setCursor", &[80]).unwrap();
    worker.dispatch(&mem, TERM, "charOut", &['z' as u32, 0]).unwrap();
    worker.dispatch(&mem, TERM, "setFocus", &[]).unwrap();

    // Nothing runs until the foreground drains its ring.
    assert_eq!(host.console::<TerminalConsole>(TERM).unwrap().row_text(0), "");
    assert_eq!(host.process_incoming(&mut mem).unwrap(), 7);

    let term = host.console::<TerminalConsole>(TERM).unwrap();
    assert_eq!(term.row_text(0), "hi!");
    assert_eq!(term.row_text(1), "AB");
    assert_eq!(term.row_text(2), "z");
    assert_eq!(
        term.cell(0, 1),
        Some(Cell {
            ch: 'A' as u32,
            foreground: 0x00FF00,
            background: 0
        })
    );
    assert!(term.has_focus());
    assert_eq!(host.process_incoming(&mut mem).unwrap(), 0);
}

#[test]
fn debug_console_emits_lines() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();
    mem.write_cstr(0x100, "hello\nwor").unwrap();
    worker.dispatch(&mem, DEBUG, "putStr", &[0x100, 65001]).unwrap();

    let (handled, logs) = capture_logs(|| host.process_incoming(&mut mem).unwrap());
    assert_eq!(handled, 1);
    assert!(logs.contains("hello"), "{logs}");
    assert!(!logs.contains("wor"), "{logs}");
    assert_eq!(host.console::<DebugConsole>(DEBUG).unwrap().pending_line(), "wor");
}

#[test]
fn get_prop_is_answered_without_a_round_trip() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();
    mem.write_cstr(0x100, "widthInChars").unwrap();
    mem.write_cstr(0x120, "type").unwrap();
    mem.write_cstr(0x140, "canvasHeight").unwrap();
    mem.write_cstr(0x160, "noSuchProp").unwrap();

    assert_eq!(worker.dispatch(&mem, TERM, "getProp", &[0x100]).unwrap(), 40);
    assert_eq!(worker.dispatch(&mem, DEBUG, "getProp", &[0x120]).unwrap(), 2);
    assert_eq!(worker.dispatch(&mem, CANVAS, "getProp", &[0x140]).unwrap(), 48);

    let (value, logs) = capture_logs(|| worker.dispatch(&mem, TERM, "getProp", &[0x160]));
    assert_eq!(value, Ok(0));
    assert!(logs.contains("unknown console property"), "{logs}");

    assert_eq!(host.process_incoming(&mut mem).unwrap(), 0);
}

#[test]
fn dispatch_rejects_bad_calls() {
    let Setup {
        mut worker, mem, ..
    } = setup();

    assert_eq!(
        worker.dispatch(&mem, TERM, "twrConCharOut", &[]),
        Err(ConsoleError::UnknownMethod("twrConCharOut".into()))
    );
    assert_eq!(
        worker.dispatch(&mem, 99, "cls", &[]),
        Err(ConsoleError::UnknownDevice(99))
    );
    assert_eq!(
        worker.dispatch(&mem, DEBUG, "charIn", &[]),
        Err(ConsoleError::UnsupportedMethod {
            id: DEBUG,
            class: ConsoleClass::Debug,
            method: ConsoleMethod::CharIn
        })
    );
    assert_eq!(
        worker.dispatch(&mem, CANVAS, "putStr", &[0, 0]),
        Err(ConsoleError::UnsupportedMethod {
            id: CANVAS,
            class: ConsoleClass::Canvas,
            method: ConsoleMethod::PutStr
        })
    );
    assert_eq!(
        worker.dispatch(&mem, TERM, "setCursor", &[]),
        Err(ConsoleError::ArgCount {
            method: ConsoleMethod::SetCursor,
            expected: 1,
            found: 0
        })
    );
    assert_eq!(
        worker.dispatch(&mem, TERM, "getConIdFromName", &[0]),
        Err(ConsoleError::NotADeviceMethod(ConsoleMethod::GetConIdFromName))
    );
}

#[test]
fn console_ids_by_name() {
    let Setup {
        worker, mut mem, ..
    } = setup();
    mem.write_cstr(0x100, "stdio").unwrap();
    mem.write_cstr(0x110, "canvas").unwrap();
    mem.write_cstr(0x120, "stderr").unwrap();

    assert_eq!(worker.get_con_id_from_name(&mem, 0x100).unwrap(), TERM);
    assert_eq!(worker.get_con_id_from_name(&mem, 0x110).unwrap(), CANVAS);
    assert_eq!(worker.get_con_id_from_name(&mem, 0x120).unwrap(), -1);
}

#[test]
fn keys_flow_from_host_to_worker() {
    let Setup {
        mut host,
        mut worker,
        mem,
    } = setup();

    assert_eq!(worker.dispatch(&mem, TERM, "inkey", &[]).unwrap(), 0);
    host.key_down(TERM, 'a' as u32).unwrap();
    host.key_down(TERM, 'b' as u32).unwrap();
    host.key_down(CANVAS, 13).unwrap();

    assert_eq!(worker.dispatch(&mem, TERM, "inkey", &[]).unwrap(), 'a' as u32);
    // A key is already waiting, so charIn does not block.
    assert_eq!(worker.dispatch(&mem, TERM, "charIn", &[]).unwrap(), 'b' as u32);
    assert_eq!(worker.dispatch(&mem, TERM, "inkey", &[]).unwrap(), 0);
    assert_eq!(worker.dispatch(&mem, CANVAS, "inkey", &[]).unwrap(), 13);

    assert_eq!(
        host.key_down(DEBUG, 1),
        Err(ConsoleError::UnsupportedMethod {
            id: DEBUG,
            class: ConsoleClass::Debug,
            method: ConsoleMethod::CharIn
        })
    );
    assert_eq!(host.key_down(42, 1), Err(ConsoleError::UnknownDevice(42)));
}

#[test]
fn malloc_requests_are_answered_over_the_request_ring() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();

    host.post_malloc(5, 64).unwrap();
    host.post_malloc(6, 3).unwrap();
    assert_eq!(worker.process_incoming_commands().unwrap(), 0);

    assert_eq!(host.take_malloc_reply(5), None);
    assert_eq!(host.process_incoming(&mut mem).unwrap(), 2);
    assert_eq!(host.take_malloc_reply(5), Some(HEAP_BASE));
    assert_eq!(host.take_malloc_reply(6), Some(HEAP_BASE + 64));
    assert_eq!(host.take_malloc_reply(6), None);

    host.post_malloc(7, 0x10_0000).unwrap();
    assert_eq!(
        worker.process_incoming_commands(),
        Err(ConsoleError::Queue(EventQueueError::AllocationFailed {
            size: 0x10_0000
        }))
    );
}

#[test]
fn events_reach_worker_callbacks() {
    let Setup {
        mut host,
        mut worker,
        ..
    } = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let tick = {
        let seen = seen.clone();
        worker.register_callback(
            "tick",
            Box::new(move |id, args| seen.borrow_mut().push((id, args.to_vec()))),
        )
    };
    let waited = worker.register_event();

    host.post_event(tick, &[1, 2]).unwrap();
    host.post_event(waited, &[9]).unwrap();
    host.post_event(tick, &[3]).unwrap();

    assert_eq!(worker.process_incoming_commands().unwrap(), 2);
    assert_eq!(*seen.borrow(), vec![(tick, vec![1, 2]), (tick, vec![3])]);
    // The unbound event is still pending for an explicit wait.
    assert_eq!(worker.wait_event(Some(waited)).unwrap(), (waited, vec![9]));
}

#[test]
fn bundle_is_single_use_and_class_names_are_checked() {
    let Setup { host, .. } = setup();
    assert!(matches!(
        WorkerEndpoint::from_bundle(&host.proxy_bundle(), Heap::new(HEAP_BASE, 16)),
        Err(ConsoleError::Buffer(CircularBufferError::EndTaken(_)))
    ));

    let mut registry = ConsoleRegistry::new();
    registry.register(Box::new(DebugConsole::new()));
    let host = ConsoleHost::new(registry, &TandemConfig::default()).unwrap();
    let mut bundle = host.proxy_bundle();
    assert_eq!(bundle.consoles[0].class_name, "DebugConsole");
    bundle.consoles[0].class_name = "twrConsoleDivProxy".into();
    assert!(matches!(
        WorkerEndpoint::from_bundle(&bundle, Heap::new(HEAP_BASE, 16)),
        Err(ConsoleError::UnknownClass(name)) if name == "twrConsoleDivProxy"
    ));
}

#[test]
fn host_rejects_invalid_config() {
    let config = TandemConfig {
        request_ring_words: 0,
        ..TandemConfig::default()
    };
    assert_eq!(
        ConsoleHost::new(ConsoleRegistry::new(), &config).err(),
        Some(ConsoleError::InvalidConfig(
            "request_ring_words must be nonzero"
        ))
    );

    let config = TandemConfig {
        request_ring_words: usize::MAX / 2,
        ..TandemConfig::default()
    };
    assert_eq!(
        ConsoleHost::new(ConsoleRegistry::new(), &config).err(),
        Some(ConsoleError::InvalidConfig(
            "request_ring_words exceeds the largest ring size"
        ))
    );
}

#[test]
fn freed_remote_allocations_are_reused() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();

    host.post_malloc(1, 0x800).unwrap();
    host.post_malloc(2, 0x800).unwrap();
    worker.process_incoming_commands().unwrap();
    assert_eq!(host.process_incoming(&mut mem).unwrap(), 2);
    let first = host.take_malloc_reply(1).unwrap();
    assert_eq!(first, HEAP_BASE);
    assert_eq!(host.take_malloc_reply(2), Some(HEAP_BASE + 0x800));
    assert_eq!(worker.heap().free_bytes(), 0);

    worker.free(first).unwrap();
    assert_eq!(
        worker.free(first),
        Err(ConsoleError::UnknownAllocation(first))
    );

    // More has now been handed out in total than the heap holds.
    host.post_malloc(3, 0x800).unwrap();
    worker.process_incoming_commands().unwrap();
    host.process_incoming(&mut mem).unwrap();
    assert_eq!(host.take_malloc_reply(3), Some(first));
    assert_eq!(worker.heap().live_blocks(), 2);
}

const PIXELS: u32 = 0x100;

fn image_sequence(config: &TandemConfig, mem: &mut SharedMemory) -> u32 {
    mem.write_bytes(PIXELS, &(1..=16).collect::<Vec<u8>>())
        .unwrap();
    let mut seq = config
        .draw_seq_builder(mem, Arena::new(0x1000, 0x1000))
        .unwrap();
    seq.push(
        mem,
        &Instruction::ImageData {
            addr: PIXELS,
            len: 16,
            width: 2,
            height: 2,
            id: 5,
        },
    )
    .unwrap();
    seq.push(
        mem,
        &Instruction::PutImageData {
            id: 5,
            dx: 0,
            dy: 0,
            dirty: None,
        },
    )
    .unwrap();
    seq.header()
}

#[test]
fn canvas_uses_the_configured_image_data_mode() {
    let zero_copy: TandemConfig =
        serde_json::from_str(r#"{"image_data_mode": "zero_copy"}"#).unwrap();
    let mut mem = SharedMemory::new(0x4000);
    let seq = image_sequence(&zero_copy, &mut mem);

    let mut canvas = CanvasConsole::from_config(RecordingSurface::new(4, 4), &zero_copy);
    assert_eq!(canvas.interpreter().mode(), ImageDataMode::ZeroCopy);
    // Borrowing in place is attempted, and shared memory refuses it.
    assert_eq!(
        canvas.draw_seq(&mut mem, seq),
        Err(ConsoleError::Draw(DrawError::Memory(
            MemoryError::Unaliasable {
                addr: PIXELS,
                len: 16
            }
        )))
    );

    let mut canvas =
        CanvasConsole::from_config(RecordingSurface::new(4, 4), &TandemConfig::default());
    assert_eq!(canvas.interpreter().mode(), ImageDataMode::Copy);
    assert_eq!(canvas.draw_seq(&mut mem, seq), Ok(2));
    assert_eq!(canvas.surface().pixel(1, 1), Some([13, 14, 15, 16]));
}

#[test]
fn out_of_range_terminal_write_is_fatal_on_the_host() {
    let Setup {
        mut host,
        mut worker,
        mut mem,
    } = setup();
    worker.dispatch(&mem, TERM, "setC32", &[400, 'x' as u32]).unwrap();
    assert_eq!(
        host.process_incoming(&mut mem),
        Err(ConsoleError::CellOutOfRange {
            location: 400,
            size: 400
        })
    );
}
