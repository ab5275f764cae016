/*! The render-op pipeline of a 2D graphics engine.

gravure turns geometric primitives into packed GPU vertex buffers, depth-sorts
3D-transformed images with a BSP compositor, and exports draw commands to PDF.

The four subsystems:

- [`alloc`]: a block allocator with placement handles, shared with worker jobs
  through a reference-counted reclamation gate.
- [`gpu`]: vertex providers that write the fixed per-vertex float layouts the
  renderer's shaders sample, for rectangles, round rects, stroked rects, and
  3D-transformed quads with per-edge antialiasing.
- [`scene3d`]: a BSP tree over convex polygons, splitting intersecting images so
  back-to-front traversal yields a correct paint order.
- [`pdf`]: a complete PDF writer, from the tagged value union and cross-reference
  table up to a page-level draw context with gradients, images, subsetted fonts,
  transparency groups and tagged structure.

## Example: a one-page PDF

```no_run
use gravure::core::{DrawContext, Fill, MCState};
use gravure::geom::{Color, Rect};
use gravure::pdf::{PdfDocument, PdfMetadata};
use gravure::stream::MemoryWriteStream;

let stream = Box::new(MemoryWriteStream::new());
let mut document = PdfDocument::new(stream, PdfMetadata::default(), None);
document.begin_page(595.0, 842.0, None).unwrap();
{
    let mut canvas = document.canvas().unwrap();
    let fill = Fill::from_color(Color::new(0.8, 0.1, 0.1, 1.0));
    canvas.draw_rect(&Rect::new(100.0, 100.0, 300.0, 200.0), &MCState::new(), &fill, None);
}
document.end_page();
document.close();
```
*/

pub mod alloc;
pub mod core;
pub mod geom;
pub mod gpu;
pub mod pdf;
pub mod scene3d;
pub mod stream;
