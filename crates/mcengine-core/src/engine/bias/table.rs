use serde::Serialize;
use std::io;

/// Per-particle-number log bias `ln_bias[N]`.
///
/// Entries beyond the stored range are defined by linear extrapolation from the
/// last stored entry with the table's slope, so unvisited particle numbers behave
/// as if the bias were the nominal `mu / T` per particle. Reading never mutates
/// the table; [`BiasTable::ensure`] materializes the extrapolated values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasTable {
    ln_bias: Vec<f64>,
    slope: f64,
}

#[derive(Debug, Serialize)]
struct BiasRow {
    n: usize,
    ln_bias: f64,
}

impl BiasTable {
    /// Creates a table with `ln_bias[0] = 0` and the given extension slope.
    pub fn new(slope: f64) -> Self {
        Self {
            ln_bias: vec![0.0],
            slope,
        }
    }

    pub fn len(&self) -> usize {
        self.ln_bias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ln_bias.is_empty()
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn set_slope(&mut self, slope: f64) {
        self.slope = slope;
    }

    pub fn values(&self) -> &[f64] {
        &self.ln_bias
    }

    pub fn value(&self, n: usize) -> f64 {
        match self.ln_bias.get(n) {
            Some(&value) => value,
            None => {
                let last = self.ln_bias.len() - 1;
                self.ln_bias[last] + (n - last) as f64 * self.slope
            }
        }
    }

    /// Grows the table so that `n` is stored explicitly.
    pub fn ensure(&mut self, n: usize) {
        while self.ln_bias.len() <= n {
            let last = self.ln_bias[self.ln_bias.len() - 1];
            self.ln_bias.push(last + self.slope);
        }
    }

    pub fn set(&mut self, n: usize, value: f64) {
        self.ensure(n);
        self.ln_bias[n] = value;
    }

    /// Drops every stored entry at or above `len`, keeping at least `ln_bias[0]`.
    pub fn truncate(&mut self, len: usize) {
        self.ln_bias.truncate(len.max(1));
    }

    /// `ln_bias[to] - ln_bias[from]`.
    pub fn diff(&self, from: usize, to: usize) -> f64 {
        self.value(to) - self.value(from)
    }

    /// Writes the stored entries as `n,ln_bias` CSV rows.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for (n, &ln_bias) in self.ln_bias.iter().enumerate() {
            writer.serialize(BiasRow { n, ln_bias })?;
        }
        writer.flush()?;
        Ok(())
    }
}
