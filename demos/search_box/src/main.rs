use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use settle_core::*;

/// Keystrokes with the pause (ms) the "user" takes after each one.
const TYPING: &[(&str, u64)] = &[
    ("r", 40),
    ("ru", 60),
    ("rus", 50),
    ("rust", 400),
    ("rust ", 30),
    ("rust t", 70),
    ("rust ti", 40),
    ("rust timer", 0),
];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let timers = Timers::system();
    set_timers(timers.clone());

    let committed = Rc::new(RefCell::new(Vec::<String>::new()));
    let composition = Composition::new();
    let spec = DebounceSpec::from_millis(250)?;

    let search = {
        let committed = committed.clone();
        composition.compose(|| {
            use_debounced_callback("search", spec, move |query: String| {
                log::info!("search: {query:?}");
                committed.borrow_mut().push(query);
            })
        })
    };

    for (text, pause) in TYPING {
        println!("typed {text:?}");
        search.call(text.to_string());
        pump(&timers, Duration::from_millis(*pause))?;
    }

    // let the last burst settle
    while let Some(deadline) = timers.next_deadline() {
        let wait = deadline.saturating_duration_since(timers.now());
        pump(&timers, wait)?;
    }

    println!("committed queries: {:?}", committed.borrow());
    composition.dispose();
    Ok(())
}

/// Sleeps in small steps, running the timer queue in between like a UI loop.
fn pump(timers: &Timers, total: Duration) -> anyhow::Result<()> {
    let step = Duration::from_millis(10);
    let mut left = total;
    loop {
        timers.run_due()?;
        if left.is_zero() {
            return Ok(());
        }
        let nap = left.min(step);
        thread::sleep(nap);
        left -= nap;
    }
}
