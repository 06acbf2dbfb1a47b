//! Live window capture using the Windows Graphics Capture API.
//!
//! The capture session stays open for the lifetime of the source. Each poll
//! drains the frame pool, keeps only the newest frame, and converts it from
//! BGRA to RGBA cropped to the window's client area.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;

use windows::core::Interface;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Foundation::TypedEventHandler;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::UI::WindowsAndMessaging::IsWindow;

use super::window::{find_window_by_title, get_client_area_info};
use super::{copy_frame, FrameSource};

const PIXEL_FORMAT: DirectXPixelFormat = DirectXPixelFormat::B8G8R8A8UIntNormalized;
const POOL_BUFFERS: i32 = 2;

pub struct WindowCaptureSource {
    hwnd: HWND,
    title: String,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    d3d_device: IDirect3DDevice,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    pool_size: SizeInt32,
    frame: Option<RgbaImage>,
    /// Keeps the Closed handler registered.
    _item: GraphicsCaptureItem,
    closed: ClosedFlag,
}

/// Set by the capture item's Closed event.
#[derive(Clone, Debug, Default)]
struct ClosedFlag(Arc<AtomicBool>);

impl ClosedFlag {
    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drops the held frame once the window is gone. Returns true when one was dropped.
fn expire_frame(frame: &mut Option<RgbaImage>, window_gone: bool) -> bool {
    window_gone && frame.take().is_some()
}

impl WindowCaptureSource {
    /// Starts capturing the first window whose title contains `title`.
    pub fn open(title: &str) -> Result<Self> {
        let (hwnd, full_title) = find_window_by_title(title)?;

        let (device, context) = create_d3d11_device()?;
        let item = create_capture_item(hwnd)?;
        let pool_size = item.Size()?;
        tracing::info!("Capture size: {}x{}", pool_size.Width, pool_size.Height);

        let d3d_device = create_direct3d_device(&device)?;
        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &d3d_device,
            PIXEL_FORMAT,
            POOL_BUFFERS,
            pool_size,
        )?;
        let closed = ClosedFlag::default();
        let closed_clone = closed.clone();
        item.Closed(&TypedEventHandler::new(
            move |_item: &Option<GraphicsCaptureItem>, _| {
                closed_clone.set();
                Ok(())
            },
        ))?;

        let session = frame_pool.CreateCaptureSession(&item)?;
        session.StartCapture()?;
        tracing::info!("Capture session started");

        Ok(Self {
            hwnd,
            title: full_title,
            device,
            context,
            d3d_device,
            frame_pool,
            session,
            pool_size,
            frame: None,
            _item: item,
            closed,
        })
    }

    /// Copies a captured frame to CPU memory as RGBA, cropped to the client area.
    fn read_frame(&self, frame: &Direct3D11CaptureFrame) -> Result<RgbaImage> {
        let (client_rect, client_offset) = get_client_area_info(self.hwnd)?;

        let surface = frame.Surface()?;
        let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        // Staging texture for CPU read
        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };

        let staging_texture = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| anyhow!("Failed to create staging texture"))?
        };
        let staging_resource: ID3D11Resource = staging_texture.cast()?;

        unsafe {
            self.context
                .CopyResource(&staging_resource, &texture.cast::<ID3D11Resource>()?);
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            self.context
                .Map(&staging_resource, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
            mapped
        };

        let src = unsafe {
            std::slice::from_raw_parts(
                mapped.pData as *const u8,
                (mapped.RowPitch * desc.Height) as usize,
            )
        };
        let client = ClientArea {
            x: client_offset.x.max(0) as u32,
            y: client_offset.y.max(0) as u32,
            width: (client_rect.right - client_rect.left).max(0) as u32,
            height: (client_rect.bottom - client_rect.top).max(0) as u32,
        };
        let img = bgra_to_rgba(src, mapped.RowPitch as usize, desc.Width, desc.Height, client);

        unsafe {
            self.context.Unmap(&staging_resource, 0);
        }

        Ok(img)
    }
}

/// Client area inside a captured window frame.
#[derive(Clone, Copy, Debug)]
struct ClientArea {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Converts a mapped BGRA texture to an RGBA image of the client area.
/// Rows or columns past the texture edge are left transparent black.
fn bgra_to_rgba(
    src: &[u8],
    row_pitch: usize,
    tex_width: u32,
    tex_height: u32,
    client: ClientArea,
) -> RgbaImage {
    let mut img = RgbaImage::new(client.width, client.height);

    for y in 0..client.height {
        let src_y = client.y + y;
        if src_y >= tex_height {
            break;
        }
        for x in 0..client.width {
            let src_x = client.x + x;
            if src_x >= tex_width {
                break;
            }
            let offset = src_y as usize * row_pitch + src_x as usize * 4;
            let b = src[offset];
            let g = src[offset + 1];
            let r = src[offset + 2];
            let a = src[offset + 3];
            img.put_pixel(x, y, image::Rgba([r, g, b, a]));
        }
    }

    img
}

impl FrameSource for WindowCaptureSource {
    fn has_frame(&mut self) -> bool {
        let window_gone = self.closed.is_set() || !unsafe { IsWindow(self.hwnd).as_bool() };
        if window_gone {
            if expire_frame(&mut self.frame, true) {
                tracing::warn!("Captured window \"{}\" was closed", self.title);
            }
            return false;
        }

        // Drain the pool; only the newest frame matters
        let mut newest = None;
        while let Ok(frame) = self.frame_pool.TryGetNextFrame() {
            newest = Some(frame);
        }

        if let Some(frame) = newest {
            match self.read_frame(&frame) {
                Ok(img) => self.frame = Some(img),
                Err(e) => tracing::debug!("Failed to read captured frame: {:#}", e),
            }

            // Window was resized: rebuild the pool at the new size
            if let Ok(content_size) = frame.ContentSize() {
                if content_size != self.pool_size {
                    tracing::info!(
                        "Window resized to {}x{}, recreating frame pool",
                        content_size.Width,
                        content_size.Height
                    );
                    match self.frame_pool.Recreate(
                        &self.d3d_device,
                        PIXEL_FORMAT,
                        POOL_BUFFERS,
                        content_size,
                    ) {
                        Ok(()) => self.pool_size = content_size,
                        Err(e) => tracing::warn!("Failed to recreate frame pool: {}", e),
                    }
                }
            }
        }

        self.frame.is_some()
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(|f| f.dimensions())
    }

    fn draw_into(&self, target: &mut RgbaImage) -> Result<()> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| anyhow!("No frame captured yet"))?;
        copy_frame(frame, target)
    }

    fn describe(&self) -> String {
        format!("[Window] {}", self.title)
    }
}

impl Drop for WindowCaptureSource {
    fn drop(&mut self) {
        let _ = self.session.Close();
        let _ = self.frame_pool.Close();
    }
}

/// Creates a Direct3D 11 device and immediate context.
fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| anyhow!("Failed to create D3D11 device"))?,
        context.ok_or_else(|| anyhow!("Failed to create D3D11 context"))?,
    ))
}

/// Wraps a D3D11 device in the WinRT device type the capture API expects.
fn create_direct3d_device(device: &ID3D11Device) -> Result<IDirect3DDevice> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    inspectable
        .cast()
        .context("Failed to cast to IDirect3DDevice")
}

/// Creates a GraphicsCaptureItem for the window.
fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe {
        windows::Win32::System::WinRT::RoGetActivationFactory(class_name)
            .context("Failed to get IGraphicsCaptureItemInterop")?
    };
    unsafe {
        interop
            .CreateForWindow(hwnd)
            .context("Failed to create capture item for window")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgba_crops_client_area() {
        // 3x2 texture, row pitch padded to 16 bytes
        let mut src = vec![0u8; 16 * 2];
        // Pixel (1, 1) = B=1 G=2 R=3 A=4
        let offset = 16 + 4;
        src[offset..offset + 4].copy_from_slice(&[1, 2, 3, 4]);

        let client = ClientArea { x: 1, y: 1, width: 2, height: 1 };
        let img = bgra_to_rgba(&src, 16, 3, 2, client);

        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0), &image::Rgba([3, 2, 1, 4]));
    }

    #[test]
    fn test_closed_window_drops_last_frame() {
        let closed = ClosedFlag::default();
        let from_event = closed.clone();
        let mut frame = Some(RgbaImage::new(4, 4));

        assert!(!expire_frame(&mut frame, closed.is_set()));
        assert!(frame.is_some());

        from_event.set();
        assert!(expire_frame(&mut frame, closed.is_set()));
        assert!(frame.is_none());
        assert!(!expire_frame(&mut frame, closed.is_set()), "only reported once");
    }
}
