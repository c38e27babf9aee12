//! Binary morphology and connected components on 0/255 masks.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{self, Connectivity};

const ON: u8 = 255;

/// Bounding box and size of one 8-connected component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixels: u32,
}

impl Component {
    fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixels: 0,
        }
    }

    fn absorb(&mut self, x: u32, y: u32) {
        self.pixels += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// 3x3 dilation, repeated `iterations` times
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    // a k-step chessboard dilation equals k passes of the 3x3 kernel
    let k = u8::try_from(iterations).unwrap_or(u8::MAX);
    morphology::dilate(mask, Norm::LInf, k)
}

/// 3x3 opening; removes isolated speckle
pub fn open(mask: &GrayImage) -> GrayImage {
    morphology::open(mask, Norm::LInf, 1)
}

/// Number of set pixels
pub fn count_on(mask: &GrayImage) -> u32 {
    mask.as_raw().iter().filter(|&&p| p == ON).count() as u32
}

/// 8-connected components, ordered top-to-bottom then left-to-right
pub fn connected_components(mask: &GrayImage) -> Vec<Component> {
    let labels = region_labelling::connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut components: Vec<Option<Component>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label.0[0] as usize;
        if id == 0 {
            continue;
        }
        if components.len() < id {
            components.resize(id, None);
        }
        components[id - 1]
            .get_or_insert_with(|| Component::at(x, y))
            .absorb(x, y);
    }

    let mut components: Vec<Component> = components.into_iter().flatten().collect();
    components.sort_by_key(|c| (c.min_y, c.min_x));
    components
}
