use crate::config::LstmConfig;
use candle_core::{Module, Result, Tensor};
use candle_nn::{Linear, LSTMConfig, VarBuilder, LSTM, RNN};

/// Two stacked LSTM layers followed by two linear layers.
///
/// The first LSTM hands its whole output sequence to the second; only the
/// second layer's final hidden state reaches the dense head.
pub struct StackedLstm {
    lstm1: LSTM,
    lstm2: LSTM,
    dense1: Linear,
    dense2: Linear,
}

impl StackedLstm {
    pub fn new(cfg: LstmConfig, vb: VarBuilder) -> Result<Self> {
        // each layer lives under its own prefix, so both keep layer_idx 0
        let hidden = cfg.hidden_dim;
        let lstm1 = candle_nn::lstm(1, hidden, LSTMConfig::default(), vb.pp("lstm1"))?;
        let lstm2 = candle_nn::lstm(hidden, hidden, LSTMConfig::default(), vb.pp("lstm2"))?;
        let dense1 = candle_nn::linear(cfg.hidden_dim, cfg.dense_dim, vb.pp("dense1"))?;
        let dense2 = candle_nn::linear(cfg.dense_dim, 1, vb.pp("dense2"))?;
        Ok(Self {
            lstm1,
            lstm2,
            dense1,
            dense2,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // x: [batch, seq_len, 1]
        let states = self.lstm1.seq(x)?;
        let sequence = self.lstm1.states_to_tensor(&states)?; // [batch, seq_len, hidden]

        let states = self.lstm2.seq(&sequence)?;
        let last_state = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("Empty LSTM sequence".into()))?;

        let h = self.dense1.forward(&last_state.h)?;
        self.dense2.forward(&h) // [batch, 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_forward_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let cfg = LstmConfig {
            hidden_dim: 8,
            dense_dim: 4,
        };
        let model = StackedLstm::new(cfg, vb)?;

        let x = Tensor::zeros((3, 12, 1), DType::F32, &device)?;
        let y = model.forward(&x)?;
        assert_eq!(y.dims(), &[3, 1]);
        Ok(())
    }

    #[test]
    fn test_parameter_count() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let _model = StackedLstm::new(LstmConfig::default(), vb)?;

        let total: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
        // candle keeps separate input and hidden bias vectors per LSTM layer
        let lstm1 = 4 * 50 * (1 + 50) + 2 * 4 * 50;
        let lstm2 = 4 * 50 * (50 + 50) + 2 * 4 * 50;
        let dense = (50 * 25 + 25) + (25 + 1);
        assert_eq!(total, lstm1 + lstm2 + dense);
        Ok(())
    }
}
