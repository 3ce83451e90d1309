/// Tick counter over a fixed run length.
///
/// # Examples
///
/// ```
/// use naheo_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut ticks = Vec::new();
/// while let Some(t) = clock.tick() {
///     ticks.push(t);
/// }
/// assert_eq!(ticks, vec![0, 1, 2]);
/// assert!(clock.is_finished());
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next tick to hand out
    current: usize,
    /// Total ticks in the run
    total: usize,
}

impl Clock {
    /// Creates a clock that hands out ticks `0..total`.
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The tick to simulate next
    /// * `None` - If every tick has been handed out
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let tick = self.current;
            self.current += 1;
            Some(tick)
        } else {
            None
        }
    }

    /// Ticks handed out so far.
    pub fn elapsed(&self) -> usize {
        self.current
    }

    /// Ticks still to come.
    pub fn remaining(&self) -> usize {
        self.total - self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.total
    }
}
