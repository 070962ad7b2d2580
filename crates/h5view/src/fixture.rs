//! The demo container used by the CLI and the test suite.

use crate::error::Result;
use crate::memory::{Image, ImageBuilder, MemoryBackend};
use crate::types::AttrValue;

/// File name the demo image is registered under.
pub const DEMO_FILENAME: &str = "test.h5";

/// Build the demo image:
///
/// ```text
/// /                               MyAttr = 23.0
/// /MyGroup1                       MyAttr2 = "my string"
/// /MyGroup1/MyGroup11
/// /MyGroup1/MyGroup11/MyGroup111
/// /MyGroup1/MyGroup11/MyGroup111/MyDataset2   f32 zeros (2, 3, 4, 5)
/// /MyGroup2
/// /MyGroup2/MyDataset1                        i32 42s   (100, 100)
/// ```
pub fn demo_image() -> Result<Image> {
    let mut b = ImageBuilder::new();
    b.set_attr("MyAttr", AttrValue::F64(23.0));

    let mut g1 = b.create_group("MyGroup1");
    g1.set_attr("MyAttr2", AttrValue::from("my string"));
    let mut g11 = g1.create_group("MyGroup11");
    let mut g111 = g11.create_group("MyGroup111");
    g111.create_dataset("MyDataset2")
        .with_f32_data(&[0.0; 2 * 3 * 4 * 5])
        .with_shape(&[2, 3, 4, 5]);
    g11.add_group(g111.finish());
    g1.add_group(g11.finish());
    b.add_group(g1.finish());

    let mut g2 = b.create_group("MyGroup2");
    g2.create_dataset("MyDataset1")
        .with_i32_data(&[42; 100 * 100])
        .with_shape(&[100, 100]);
    b.add_group(g2.finish());

    b.finish()
}

/// A backend with the demo image registered as [`DEMO_FILENAME`].
pub fn demo_backend() -> Result<MemoryBackend> {
    Ok(MemoryBackend::new().with_image(DEMO_FILENAME, demo_image()?))
}
