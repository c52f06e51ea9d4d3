// Slider Module - Value model behind the bitrate, delay and latency controls
//
// Values are clamped to the slider range and snapped to the step grid,
// measured from the slider minimum.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slider {
    pub min: i32,
    pub max: i32,
    pub step: i32,
    value: i32,
}

impl Slider {
    pub fn new(min: i32, max: i32, step: i32, value: i32) -> Self {
        let mut slider = Slider { min, max, step: step.max(1), value: min };
        slider.set(value);
        slider
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    /// Move to `value`, normalized. Returns the value actually taken.
    pub fn set(&mut self, value: i32) -> i32 {
        self.value = snap(value, self.min, self.max, self.step);
        self.value
    }

    pub fn nudge(&mut self, steps: i32) -> i32 {
        self.set(self.value.saturating_add(steps.saturating_mul(self.step)))
    }
}

/// Dual-handle slider; the low handle never passes the high one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSlider {
    pub min: i32,
    pub max: i32,
    pub step: i32,
    values: (i32, i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Low,
    High,
}

impl RangeSlider {
    pub fn new(min: i32, max: i32, step: i32, values: (i32, i32)) -> Self {
        let mut slider = RangeSlider { min, max, step: step.max(1), values: (min, max) };
        slider.set(values);
        slider
    }

    pub fn values(&self) -> (i32, i32) {
        self.values
    }

    pub fn set(&mut self, (low, high): (i32, i32)) -> (i32, i32) {
        let low = snap(low, self.min, self.max, self.step);
        let high = snap(high, self.min, self.max, self.step);
        self.values = if low <= high { (low, high) } else { (high, high) };
        self.values
    }

    pub fn nudge(&mut self, handle: Handle, steps: i32) -> (i32, i32) {
        let delta = steps.saturating_mul(self.step);
        let (low, high) = self.values;
        match handle {
            Handle::Low => {
                let low = snap(low.saturating_add(delta), self.min, self.max, self.step).min(high);
                self.values = (low, high);
            }
            Handle::High => {
                let high = snap(high.saturating_add(delta), self.min, self.max, self.step).max(low);
                self.values = (low, high);
            }
        }
        self.values
    }
}

fn snap(value: i32, min: i32, max: i32, step: i32) -> i32 {
    let clamped = value.clamp(min, max);
    let offset = clamped - min;
    let rem = offset % step;
    let snapped = if rem * 2 >= step { clamped - rem + step } else { clamped - rem };
    // Snapping up can overshoot a max that is not on the grid
    if snapped > max {
        snapped - step
    } else {
        snapped
    }
}

// Control ranges used by the settings panel
pub fn bitrate_slider(values: (u32, u32)) -> RangeSlider {
    RangeSlider::new(500, 12000, 100, (values.0 as i32, values.1 as i32))
}

pub fn delay_slider(value: i32) -> Slider {
    Slider::new(-2000, 2000, 20, value)
}

pub fn srt_latency_slider(value: u32) -> Slider {
    Slider::new(100, 4000, 100, value as i32)
}

pub fn bitrate_label(prefix: &str, (min, max): (i32, i32)) -> String {
    format!("{}: {} - {} Kbps", prefix, min, max)
}

pub fn millis_label(prefix: &str, value: i32) -> String {
    format!("{}: {} ms", prefix, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bitrate() {
        let slider = bitrate_slider((1000, 8000));
        assert_eq!(slider.values(), (1000, 8000));
        assert_eq!(bitrate_label("Bitrate", slider.values()), "Bitrate: 1000 - 8000 Kbps");
    }

    #[test]
    fn test_clamp_and_snap() {
        let mut delay = delay_slider(0);
        assert_eq!(delay.set(5000), 2000);
        assert_eq!(delay.set(-31), -40);
        assert_eq!(delay.set(-29), -20);

        let latency = srt_latency_slider(50);
        assert_eq!(latency.value(), 100);
    }

    #[test]
    fn test_off_grid_max() {
        let mut slider = Slider::new(0, 95, 10, 0);
        assert_eq!(slider.set(95), 90);
    }

    #[test]
    fn test_handles_do_not_cross() {
        let mut bitrate = bitrate_slider((1000, 1200));
        assert_eq!(bitrate.nudge(Handle::Low, 5), (1200, 1200));
        assert_eq!(bitrate.nudge(Handle::High, -3), (1200, 1200));
        assert_eq!(bitrate.nudge(Handle::High, 2), (1200, 1400));
    }

    #[test]
    fn test_inverted_seed_collapses() {
        let slider = bitrate_slider((9000, 2000));
        assert_eq!(slider.values(), (2000, 2000));
    }

    #[test]
    fn test_nudge_stops_at_edges() {
        let mut latency = srt_latency_slider(3900);
        assert_eq!(latency.nudge(3), 4000);
        assert_eq!(millis_label("SRT latency", latency.value()), "SRT latency: 4000 ms");
    }
}
