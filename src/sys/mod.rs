cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod unix;
        pub use unix::*;
    } else {
        compile_error!("xevent relies on epoll, eventfd and timerfd, which are only available on linux");
    }
}

mod poll;
pub use poll::*;
