//! OME-XML metadata document.
//!
//! The document is embedded as the ImageDescription of the first pyramid level.
//! It describes a single image with one `Channel` element per canvas channel,
//! in canvas order, carrying the resolved display colour, fluorophore and
//! wavelengths.

use crate::mosaic::channels::ChannelDescriptor;

const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Image-level fields of the OME document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmeImage {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// OME pixel type, e.g. `uint16`
    pub pixel_type: &'static str,
}

/// Build the OME-XML document for an image and its channels.
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06" ...>
///   <Image ID="Image:0" Name="Merged Image">
///     <Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint16" SizeX="2048" ...>
///       <Channel ID="Channel:0:0" Name="DAPI" SamplesPerPixel="1" Color="65535"
///                Fluor="DAPI" EmissionWavelength="461" ExcitationWavelength="358"/>
///       <TiffData IFD="0" PlaneCount="1"/>
///     </Pixels>
///   </Image>
/// </OME>
/// ```
pub fn ome_xml(image: &OmeImage, channels: &[ChannelDescriptor]) -> String {
    let channel_elements: String = channels
        .iter()
        .enumerate()
        .map(|(index, channel)| channel_element(index, channel))
        .collect();

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<OME xmlns="{ns}" xmlns:xsi="{xsi}" xsi:schemaLocation="{ns} {ns}/ome.xsd">"#,
            r#"<Image ID="Image:0" Name="{name}">"#,
            r#"<Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="{pixel_type}" "#,
            r#"SizeX="{width}" SizeY="{height}" SizeC="{size_c}" SizeZ="1" SizeT="1" "#,
            r#"PhysicalSizeX="1.0" PhysicalSizeY="1.0" PhysicalSizeXUnit="µm" PhysicalSizeYUnit="µm">"#,
            "{channels}",
            r#"<TiffData IFD="0" PlaneCount="{size_c}"/>"#,
            "</Pixels></Image></OME>"
        ),
        ns = OME_NAMESPACE,
        xsi = XSI_NAMESPACE,
        name = escape_attr(&image.name),
        pixel_type = image.pixel_type,
        width = image.width,
        height = image.height,
        size_c = channels.len(),
        channels = channel_elements,
    )
}

fn channel_element(index: usize, channel: &ChannelDescriptor) -> String {
    let emission = channel
        .emission
        .map(|nm| format!(r#" EmissionWavelength="{nm}""#))
        .unwrap_or_default();
    let excitation = channel
        .excitation
        .map(|nm| format!(r#" ExcitationWavelength="{nm}""#))
        .unwrap_or_default();

    format!(
        r#"<Channel ID="Channel:0:{index}" Name="{}" SamplesPerPixel="1" Color="{}" Fluor="{}"{emission}{excitation}/>"#,
        escape_attr(&channel.name),
        channel.color.ome_rgba(),
        escape_attr(&channel.fluor),
    )
}

/// Escape a string for use inside a double-quoted XML attribute.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
