use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tandem::console::consoles::TerminalConsole;
use tandem::console::CanvasConsole;
use tandem::d2d::{Instruction, RecordingSurface, SurfaceCall};
use tandem::mem::{Arena, Heap};
use tandem::{ConsoleHost, ConsoleRegistry, Memory, SharedMemory, TandemConfig, WorkerEndpoint};

const MEM_BYTES: usize = 0x2_0000;
const SEQ_ARENA: (u32, u32) = (0x1000, 0x8000);
const MALLOC_HEAP: (u32, u32) = (0x1_0000, 0x1000);
const SCRATCH: u32 = 0x100;

fn terminal_and_canvas() -> (ConsoleHost, i32, i32) {
    let mut registry = ConsoleRegistry::new();
    let term = registry
        .register_named("stdio", Box::new(TerminalConsole::new(20, 8)))
        .unwrap();
    let mut surface = RecordingSurface::new(32, 32);
    surface.add_image("ball.png", 4, 4);
    let canvas = registry
        .register_named(
            "draw",
            Box::new(CanvasConsole::from_config(surface, &TandemConfig::default())),
        )
        .unwrap();
    let host = ConsoleHost::new(registry, &TandemConfig::default()).unwrap();
    (host, term, canvas)
}

fn spawn_worker<T, F>(host: &ConsoleHost, mem: &SharedMemory, body: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&mut WorkerEndpoint, &mut SharedMemory) -> T + Send + 'static,
{
    let bundle = host.proxy_bundle();
    let mut mem = mem.clone();
    thread::spawn(move || {
        let heap = Heap::new(MALLOC_HEAP.0, MALLOC_HEAP.1);
        let mut worker = WorkerEndpoint::from_bundle(&bundle, heap).unwrap();
        body(&mut worker, &mut mem)
    })
}

/// Serve the worker's requests until it exits.
fn drive<T>(host: &mut ConsoleHost, mem: &mut SharedMemory, worker: JoinHandle<T>) -> T {
    while !worker.is_finished() {
        host.process_incoming(mem).unwrap();
        thread::yield_now();
    }
    host.process_incoming(mem).unwrap();
    worker.join().unwrap()
}

#[test]
fn draw_seq_blocks_until_the_host_has_drawn() {
    let (mut host, _, canvas) = terminal_and_canvas();
    let mut mem = SharedMemory::new(MEM_BYTES);

    let worker = spawn_worker(&host, &mem, move |worker, mem| {
        let arena = Arena::new(SEQ_ARENA.0, SEQ_ARENA.1);
        let mut seq = TandemConfig::default()
            .draw_seq_builder(mem, arena)
            .unwrap();
        seq.push(mem, &Instruction::SetFillStyleRgba(0xFF0000FF))
            .unwrap();
        seq.push(
            mem,
            &Instruction::FillRect {
                x: 1.0,
                y: 2.0,
                w: 3.0,
                h: 4.0,
            },
        )
        .unwrap();
        let result = worker
            .dispatch(mem, canvas, "drawSeq", &[seq.header()])
            .unwrap();
        // Clearing empties the sequence in place; had the call returned early
        // the host would find nothing to draw.
        seq.clear(mem).unwrap();
        result
    });

    assert_eq!(drive(&mut host, &mut mem, worker), 0);
    let surface = host
        .console::<CanvasConsole<RecordingSurface>>(canvas)
        .unwrap()
        .surface();
    assert!(surface.calls().contains(&SurfaceCall::FillRect {
        x: 1.0,
        y: 2.0,
        w: 3.0,
        h: 4.0
    }));
}

#[test]
fn terminal_writes_arrive_in_order() {
    let (mut host, term, _) = terminal_and_canvas();
    let mut mem = SharedMemory::new(MEM_BYTES);

    let worker = spawn_worker(&host, &mem, move |worker, mem| {
        for i in 0..5 {
            mem.write_cstr(SCRATCH, &format!("line {i}")).unwrap();
            worker
                .dispatch(mem, term, "putStr", &[SCRATCH, 65001])
                .unwrap();
            worker
                .dispatch(mem, term, "charOut", &['\n' as u32, 65001])
                .unwrap();
        }
    });
    drive(&mut host, &mut mem, worker);

    let terminal = host.console::<TerminalConsole>(term).unwrap();
    let rows: Vec<String> = (0..5).map(|y| terminal.row_text(y)).collect();
    assert_eq!(rows, ["line 0", "line 1", "line 2", "line 3", "line 4"]);
    assert_eq!(terminal.cursor(), 5 * 20);
}

#[test]
fn char_in_waits_for_keys() {
    let (mut host, term, _) = terminal_and_canvas();
    let mem = SharedMemory::new(MEM_BYTES);

    let worker = spawn_worker(&host, &mem, move |worker, mem| {
        (0..3)
            .map(|_| worker.dispatch(mem, term, "charIn", &[]).unwrap())
            .collect::<Vec<_>>()
    });
    for key in ['x', 'y', 'z'] {
        host.key_down(term, key as u32).unwrap();
    }

    let keys = worker.join().unwrap();
    assert_eq!(keys, vec!['x' as u32, 'y' as u32, 'z' as u32]);
}

#[test]
fn synchronous_calls_return_host_results() {
    let (mut host, term, canvas) = terminal_and_canvas();
    let mut mem = SharedMemory::new(MEM_BYTES);

    let worker = spawn_worker(&host, &mem, move |worker, mem| {
        worker.dispatch(mem, term, "setReset", &[0, 0, 1]).unwrap();
        mem.write_cstr(SCRATCH, "ball.png").unwrap();
        mem.write_cstr(SCRATCH + 0x20, "missing.png").unwrap();
        [
            worker.dispatch(mem, term, "point", &[0, 0]).unwrap(),
            worker.dispatch(mem, term, "point", &[1, 0]).unwrap(),
            worker
                .dispatch(mem, canvas, "loadImage", &[SCRATCH, 7])
                .unwrap(),
            worker
                .dispatch(mem, canvas, "loadImage", &[SCRATCH + 0x20, 8])
                .unwrap(),
        ]
    });

    assert_eq!(drive(&mut host, &mut mem, worker), [1, 0, 1, 0]);
    let resources = host
        .console::<CanvasConsole<RecordingSurface>>(canvas)
        .unwrap()
        .interpreter()
        .resources();
    assert!(resources.contains(7));
    assert!(!resources.contains(8));
}

#[test]
fn malloc_is_served_while_the_worker_waits() {
    let (mut host, _, _) = terminal_and_canvas();
    let mut mem = SharedMemory::new(MEM_BYTES);
    let (tx, rx) = mpsc::channel();

    let worker = spawn_worker(&host, &mem, move |worker, _| {
        let done = worker.register_event();
        tx.send(done).unwrap();
        worker.wait_event(Some(done)).unwrap()
    });
    let done = rx.recv().unwrap();

    host.post_malloc(11, 24).unwrap();
    let addr = loop {
        host.process_incoming(&mut mem).unwrap();
        if let Some(addr) = host.take_malloc_reply(11) {
            break addr;
        }
        thread::yield_now();
    };
    assert_eq!(addr, MALLOC_HEAP.0);
    host.post_event(done, &[addr]).unwrap();

    assert_eq!(drive(&mut host, &mut mem, worker), (done, vec![addr]));
}
