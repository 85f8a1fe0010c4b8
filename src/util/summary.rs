use std::fmt::Display;

/// Running minimum, maximum and mean of a series of counts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f32,
}

impl Summary {
    pub fn add(&mut self, value: usize) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value as f32 - self.mean) / (self.count as f32);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            count: 0,
            min: usize::MAX,
            max: 0,
            mean: 0.0,
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no samples");
        }
        write!(
            f,
            "{} - {}; mean {:.1}; {} samples",
            self.min, self.max, self.mean, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    fn summary_of(values: &[usize]) -> Summary {
        let mut summary = Summary::default();
        for value in values {
            summary.add(*value);
        }
        summary
    }

    #[test]
    fn running_values() {
        let s = summary_of(&[4, 1, 7]);
        assert!(s.count == 3);
        assert!(s.min == 1);
        assert!(s.max == 7);
        assert!(s.mean == 4.0);
    }

    #[test]
    fn default_is_empty() {
        assert!(Summary::default().is_empty());
        assert!(!summary_of(&[0]).is_empty());
    }

    #[test]
    fn display_format() {
        let output = summary_of(&[42]).to_string();
        assert!(output.contains("42 - 42"));
        assert!(output.contains("mean 42.0"));
        assert!(output.contains("1 samples"));
        assert!(Summary::default().to_string() == "no samples");
    }
}
