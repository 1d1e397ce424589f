use burn::prelude::*;

/// Amount of padding that brings `len` up to the next multiple of `divisor`.
pub fn padding_for(len: usize, divisor: usize) -> usize {
    (divisor - len % divisor) % divisor
}

/// Zero-pad an image batch on the bottom and right edges so that both spatial
/// dimensions are multiples of `divisor`.
///
/// The input is returned untouched when it is already aligned.
pub fn pad_to_divisor<B: Backend>(input: Tensor<B, 4>, divisor: usize) -> Tensor<B, 4> {
    let [_, _, height, width] = input.dims();
    let pad_bottom = padding_for(height, divisor);
    let pad_right = padding_for(width, divisor);

    if pad_bottom == 0 && pad_right == 0 {
        return input;
    }

    tracing::trace!(height, width, pad_bottom, pad_right, "padding input");
    input.pad((0, pad_right, 0, pad_bottom), 0.0)
}
