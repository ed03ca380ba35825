pub mod layers;
pub mod loss;
pub mod score;
pub mod tensor;
pub mod train;

mod activation;
mod gradient_descent;
mod network;

pub use self::activation::Activation;
pub use self::gradient_descent::{Adam, Descent, GradientDescent, SimpleGradientDescent};
pub use self::network::{Mode, Network};
