use super::*;
use crate::test_host::TestHost;
use futures::channel::oneshot;
use std::sync::atomic::AtomicUsize;
use std::task::Waker;
use std::thread;

#[test]
fn first_poll_is_posted_not_run_inline() {
    let host = TestHost::new();
    let ran = Arc::new(AtomicBool::new(false));
    let ran_in_task = ran.clone();

    spawn_on_main_thread(host.clone(), async move {
        ran_in_task.store(true, Ordering::SeqCst);
    });

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(host.pending(), 1);
    host.run_pending();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn wake_from_another_thread_resumes_on_main_queue() {
    let host = TestHost::new();
    let (tx, rx) = oneshot::channel::<u32>();
    let observed = Arc::new(AtomicUsize::new(0));
    let observed_in_task = observed.clone();
    let host_in_task = host.clone();

    spawn_on_main_thread(host.clone(), async move {
        let value = rx.await.unwrap_or(0);
        assert!(host_in_task.is_main_thread());
        observed_in_task.store(value as usize, Ordering::SeqCst);
    });
    host.run_pending();
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    thread::spawn(move || tx.send(7).expect("send"))
        .join()
        .expect("sender thread");

    assert_eq!(host.pending(), 1);
    host.run_pending();
    assert_eq!(observed.load(Ordering::SeqCst), 7);
}

struct YieldTwice {
    polls: Arc<AtomicUsize>,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl Future for YieldTwice {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.polls.fetch_add(1, Ordering::SeqCst) >= 1 {
            return Poll::Ready(());
        }
        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[test]
fn repeated_wakes_coalesce_into_one_poll() {
    let host = TestHost::new();
    let polls = Arc::new(AtomicUsize::new(0));
    let waker = Arc::new(Mutex::new(None));

    spawn_on_main_thread(
        host.clone(),
        YieldTwice {
            polls: polls.clone(),
            waker: waker.clone(),
        },
    );
    host.run_pending();
    assert_eq!(polls.load(Ordering::SeqCst), 1);

    let waker = waker.lock().take().expect("registered waker");
    waker.wake_by_ref();
    waker.wake_by_ref();
    waker.wake();

    assert_eq!(host.pending(), 1);
    host.run_pending();
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}
