// Task background milik satu halaman; dibatalkan saat halaman ditinggalkan
use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct PageScope {
    tasks: Vec<JoinHandle<()>>,
}

impl PageScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|handle| !handle.is_finished());
        self.tasks.push(tokio::spawn(task));
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|handle| !handle.is_finished()).count()
    }

    pub fn cancel_all(&mut self) {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for PageScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
