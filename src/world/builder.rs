use super::World;

/// Configures a [`World`] before it is created.
///
/// ```
/// let world = tabec::world::Builder::default().concurrency(2).thread_name("physics").build();
/// assert_eq!(world.concurrency(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) concurrency: usize,
    pub(crate) thread_name: String,
    pub(crate) capacity:    usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(match std::thread::available_parallelism() {
            Ok(c) => c.get(),
            Err(err) => {
                log::error!("Cannot detect number of CPUs ({err}), parallelism disabled");
                0
            }
        })
    }
}

impl Builder {
    /// Creates a builder with `concurrency` worker threads.
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency, thread_name: String::from("tabec worker"), capacity: 0 }
    }

    /// Sets the number of worker threads used by parallel jobs.
    ///
    /// With zero threads, jobs run on the calling thread.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the name prefix of the worker threads.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Reserves space for `capacity` entities.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Creates the world.
    ///
    /// # Panics
    /// Panics if the worker threads cannot be spawned.
    pub fn build(self) -> World {
        let pool = (self.concurrency > 0).then(|| {
            let prefix = self.thread_name.clone();
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.concurrency)
                .thread_name(move |i| format!("{prefix} #{i}"))
                .build()
                .expect("Failed to create thread pool")
        });

        World::from_builder(self, pool)
    }
}
