use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use rusty_dispatch::{
    Arity, DeliveryThread, Dispatchable, Dispatcher, Observer, Payload, Selector, payload,
};

const STARTED: Selector = Selector::new("download_started");
const PROGRESS: Selector = Selector::new("download_progress");
const FINISHED: Selector = Selector::new("download_finished");

/// Observers of a download: anything that can follow its events.
trait DownloadObserver: Observer {}

/// Renders a progress bar; only cares about progress and completion.
struct ProgressBar {
    last: Mutex<u8>,
}

impl Observer for ProgressBar {
    fn responds_to(&self, selector: Selector, arity: Arity) -> bool {
        matches!(
            (selector, arity),
            (PROGRESS, Arity::Two) | (FINISHED, Arity::One)
        )
    }

    fn perform(&self, selector: Selector, payload: &Payload) {
        let on = thread::current().name().unwrap_or("?").to_string();
        if selector == PROGRESS {
            let percent = payload.arg::<u8>(1).copied().unwrap_or_default();
            *self.last.lock().unwrap() = percent;
            println!("[{on}] {:<20} {percent:>3}%", "#".repeat(percent as usize / 5));
        } else if let Some(url) = payload.arg::<String>(0) {
            println!("[{on}] done: {url}");
        }
    }
}

impl DownloadObserver for ProgressBar {}

/// Writes a line for every event it sees, whatever the arity.
struct History;

impl Observer for History {
    fn responds_to(&self, _: Selector, _: Arity) -> bool {
        true
    }

    fn perform(&self, selector: Selector, payload: &Payload) {
        println!("history: {} ({} args)", selector, payload.arity());
    }
}

impl DownloadObserver for History {}

struct Downloader {
    dispatcher: Dispatcher<dyn DownloadObserver>,
}

impl Dispatchable for Downloader {
    type Ability = dyn DownloadObserver;

    fn dispatcher(&self) -> &Dispatcher<dyn DownloadObserver> {
        &self.dispatcher
    }
}

impl Downloader {
    fn fetch(&self, url: &str) {
        let url = url.to_string();
        self.dispatch(STARTED, Some(payload::value(url.clone())), None);
        for percent in (0..=100u8).step_by(25) {
            thread::sleep(Duration::from_millis(10));
            self.dispatch(
                PROGRESS,
                Some(payload::value(url.clone())),
                Some(payload::value(percent)),
            );
        }
        self.dispatch(FINISHED, Some(payload::value(url)), None);
    }
}

fn main() {
    let main_thread = DeliveryThread::builder()
        .name("main")
        .spawn()
        .expect("failed to start delivery thread");

    let downloader = Arc::new(Downloader {
        dispatcher: Dispatcher::on_thread(&main_thread).with_label("downloader"),
    });

    let bar: Arc<dyn DownloadObserver> = Arc::new(ProgressBar {
        last: Mutex::new(0),
    });
    let history: Arc<dyn DownloadObserver> = Arc::new(History);
    downloader.add(&bar);
    downloader.add(&history);

    let worker = {
        let downloader = Arc::clone(&downloader);
        thread::spawn(move || downloader.fetch("https://example.com/archive.tar"))
    };
    worker.join().expect("download worker panicked");
    main_thread.sync().expect("delivery thread stopped");

    // The history view goes away without unregistering.
    drop(history);
    downloader.fetch("https://example.com/readme.txt");
    main_thread.sync().expect("delivery thread stopped");

    println!("{} observer(s) still registered", downloader.dispatcher().len());
}
