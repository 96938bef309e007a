use candle_core::Tensor;
use derive_more::{Deref, DerefMut};

#[derive(Deref, DerefMut, Debug)]
pub struct Logp(pub Tensor);

#[derive(Deref, DerefMut, Debug)]
pub struct PolicyLoss(pub Tensor);

#[derive(Deref, DerefMut, Debug)]
pub struct ValueLoss(pub Tensor);
